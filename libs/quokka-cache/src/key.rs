//! Canonical query keys
//!
//! A `QueryKey` is an ordered, immutable sequence of segments identifying
//! one cacheable read. Identical logical queries must collide into one key,
//! so free-text segments are normalized before inclusion and absent
//! optional segments are omitted entirely.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One element of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Int(i64),
    Text(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Int(n) => write!(f, "{}", n),
            Segment::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Canonical identifier for one cacheable read
///
/// Keys are built through [`QueryKey::of`] or the domain registry in
/// [`crate::QueryKeys`], never assembled from raw strings. Equality is
/// structural, so the same inputs always land in the same cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<Segment>);

impl QueryKey {
    /// Start a key for the given entity name
    ///
    /// Fails fast on an empty entity name: that is a caller bug, not a
    /// runtime condition.
    pub fn of(entity: &str) -> CacheResult<Self> {
        if entity.trim().is_empty() {
            return Err(CacheError::EmptyEntityName);
        }
        Ok(Self(vec![Segment::Text(entity.to_string())]))
    }

    /// Registry-internal constructor for static, known-non-empty entity names
    pub(crate) fn entity_key(entity: &'static str) -> Self {
        Self(vec![Segment::Text(entity.to_string())])
    }

    /// Append a text segment
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.0.push(Segment::Text(value.into()));
        self
    }

    /// Append an integer segment
    pub fn int(mut self, value: i64) -> Self {
        self.0.push(Segment::Int(value));
        self
    }

    /// Append a text segment if present; absent values are omitted so
    /// `of("x")?.text("a").opt_text(None)` equals `of("x")?.text("a")`
    pub fn opt_text(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(v),
            None => self,
        }
    }

    /// Append an integer segment if present
    pub fn opt_int(self, value: Option<i64>) -> Self {
        match value {
            Some(v) => self.int(v),
            None => self,
        }
    }

    /// Append a free-text segment, normalized so that "Binary Search" and
    /// "binary  search" produce the same key
    pub fn search_text(self, query: &str) -> Self {
        self.text(normalize_search_text(query))
    }

    /// The entity name this key was built for
    pub fn entity(&self) -> &str {
        match self.0.first() {
            Some(Segment::Text(s)) => s,
            _ => "unknown",
        }
    }

    /// All segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Text segment at `index`, if that segment exists and is text
    pub fn text_at(&self, index: usize) -> Option<&str> {
        match self.0.get(index) {
            Some(Segment::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether this key begins with every segment of `prefix`
    ///
    /// `["a"]` is a prefix of `["a", "b"]`; `["a", "b"]` is not a prefix
    /// of `["a"]`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Normalize free text for inclusion in a key: trim, collapse internal
/// whitespace, lowercase
pub fn normalize_search_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
