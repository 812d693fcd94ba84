//! Deterministic in-memory data source for QuokkaQ
//!
//! Stands in for the real backend behind the query cache: resolves every
//! registry key against a seeded dataset and applies write commands to it.
//! The dataset is a pure function of `(seed, now)`, so demos and tests see
//! identical data on every run.
//!
//! Instances are independent — construct one per test with
//! [`MockDataSource::with_seed`] rather than sharing a global.
//!
//! # Example
//!
//! ```no_run
//! use quokka_cache::{DataSource, QueryKeys};
//! use quokka_mock_source::MockDataSource;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = MockDataSource::new();
//!     let course = source.fetch(&QueryKeys::course("C1")).await.unwrap();
//!     println!("{}", course["name"]);
//! }
//! ```

use async_trait::async_trait;
use quokka_cache::{DataSource, QueryKey, SourceError, WriteCommand};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub mod dashboard;
pub mod engagement;
pub mod model;
pub mod mutations;
pub mod seed;

pub use model::{
    AiAnswer, Citation, Course, CourseActivity, CourseMetrics, DashboardSummary, Notification,
    Post, Role, Thread, ThreadStatus, User,
};
pub use seed::{reference_now, SeedData, DEFAULT_SEED};

/// In-memory data source over a seeded QuokkaQ dataset
pub struct MockDataSource {
    state: Mutex<SeedData>,
    fetch_counts: Mutex<HashMap<String, u32>>,
    fail_next_fetch: AtomicBool,
    fail_next_execute: AtomicBool,
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataSource {
    /// Demo dataset: seed 42 against the reference timestamp
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED, reference_now())
    }

    pub fn with_seed(seed: u64, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            state: Mutex::new(SeedData::generate(seed, now)),
            fetch_counts: Mutex::new(HashMap::new()),
            fail_next_fetch: AtomicBool::new(false),
            fail_next_execute: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current dataset
    pub fn data(&self) -> SeedData {
        self.state().clone()
    }

    /// How many times `key` has been fetched
    pub fn fetch_count(&self, key: &QueryKey) -> u32 {
        self.fetch_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Make the next `fetch` fail, for fail-soft tests
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Make the next `execute` fail, for rollback tests
    pub fn fail_next_execute(&self) {
        self.fail_next_execute.store(true, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, SeedData> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_fetch(&self, key: &QueryKey) {
        *self
            .fetch_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert(0) += 1;
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, SourceError> {
    serde_json::to_value(value).map_err(|e| SourceError::Fetch(e.to_string()))
}

fn required_str<'a>(key: &'a QueryKey, index: usize) -> Result<&'a str, SourceError> {
    key.text_at(index)
        .ok_or_else(|| SourceError::NotFound(key.to_string()))
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, SourceError> {
    payload[field]
        .as_str()
        .ok_or_else(|| SourceError::Rejected(format!("missing field: {}", field)))
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch(&self, key: &QueryKey) -> Result<Value, SourceError> {
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(SourceError::Unavailable(
                "injected fetch failure".to_string(),
            ));
        }
        self.record_fetch(key);
        debug!(key = %key, "mock fetch");

        let data = self.state();
        match key.entity() {
            "course" => {
                let course = data
                    .course(required_str(key, 1)?)
                    .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
                to_value(course)
            }
            "courseRoster" => {
                let course = data
                    .course(required_str(key, 1)?)
                    .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
                let instructors: Vec<&User> = course
                    .instructor_ids
                    .iter()
                    .filter_map(|id| data.user(id))
                    .collect();
                Ok(json!({
                    "courseId": course.id,
                    "enrollmentCount": course.enrollment_count,
                    "instructorIds": course.instructor_ids,
                    "instructors": to_value(&instructors)?,
                }))
            }
            "courseThreads" => {
                let course_id = required_str(key, 1)?;
                if data.course(course_id).is_none() {
                    return Err(SourceError::NotFound(key.to_string()));
                }
                let threads: Vec<&Thread> = data
                    .threads
                    .iter()
                    .filter(|t| t.course_id == course_id)
                    .collect();
                to_value(&threads)
            }
            "courseMetrics" => {
                let course_id = required_str(key, 1)?;
                if data.course(course_id).is_none() {
                    return Err(SourceError::NotFound(key.to_string()));
                }
                to_value(&dashboard::course_metrics(&data, course_id))
            }
            "thread" => {
                let thread = data
                    .thread(required_str(key, 1)?)
                    .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
                Ok(json!({
                    "thread": to_value(thread)?,
                    "posts": to_value(&data.posts_for(&thread.id))?,
                }))
            }
            "aiAnswer" => {
                let answer = data
                    .ai_answer_for(required_str(key, 1)?)
                    .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
                to_value(answer)
            }
            "threadSearch" => {
                // the key carries the normalized query text
                let course_id = required_str(key, 1)?;
                let query = required_str(key, 2)?;
                let matches: Vec<&Thread> = data
                    .threads
                    .iter()
                    .filter(|t| {
                        t.course_id == course_id && t.title.to_lowercase().contains(query)
                    })
                    .collect();
                to_value(&matches)
            }
            "instructorDashboard" => {
                let user_id = required_str(key, 1)?;
                to_value(&dashboard::instructor_dashboard(&data, user_id))
            }
            "studentDashboard" => {
                let user_id = required_str(key, 1)?;
                to_value(&dashboard::student_dashboard(&data, user_id))
            }
            "notifications" => {
                let user_id = required_str(key, 1)?;
                let notifications: Vec<&Notification> = data
                    .notifications
                    .iter()
                    .filter(|n| n.user_id == user_id)
                    .collect();
                to_value(&notifications)
            }
            _ => Err(SourceError::NotFound(key.to_string())),
        }
    }

    async fn execute(&self, command: WriteCommand) -> Result<Value, SourceError> {
        if self.fail_next_execute.swap(false, Ordering::SeqCst) {
            return Err(SourceError::Unavailable(
                "injected execute failure".to_string(),
            ));
        }
        debug!(operation = %command.operation, "mock execute");

        let mut data = self.state();
        match command.operation.as_str() {
            // every write answers with the ids narrow invalidation needs:
            // the affected thread/course and that course's instructors
            "endorse_answer" => {
                let thread_id = payload_str(&command.payload, "threadId")?.to_string();
                let role: Role = serde_json::from_value(command.payload["role"].clone())
                    .map_err(|_| SourceError::Rejected("missing field: role".to_string()))?;

                let course_id = data
                    .thread(&thread_id)
                    .map(|t| t.course_id.clone())
                    .ok_or_else(|| SourceError::NotFound(thread_id.clone()))?;
                let instructor_ids = data
                    .course(&course_id)
                    .map(|c| c.instructor_ids.clone())
                    .unwrap_or_default();

                let answer = data
                    .ai_answers
                    .iter_mut()
                    .find(|a| a.thread_id == thread_id)
                    .ok_or_else(|| {
                        SourceError::Rejected(format!("thread {} has no AI answer", thread_id))
                    })?;
                match role {
                    Role::Instructor => {
                        answer.instructor_endorsements += 1;
                        answer.instructor_endorsed = true;
                    }
                    Role::Student => answer.student_endorsements += 1,
                }
                answer.total_endorsements = engagement::total_endorsements(
                    answer.student_endorsements,
                    answer.instructor_endorsements,
                );

                Ok(json!({
                    "threadId": thread_id,
                    "answerId": answer.id,
                    "courseId": course_id,
                    "instructorIds": instructor_ids,
                    "totalEndorsements": answer.total_endorsements,
                }))
            }
            "create_thread" => {
                let course_id = payload_str(&command.payload, "courseId")?.to_string();
                let author_id = payload_str(&command.payload, "authorId")?.to_string();
                let title = payload_str(&command.payload, "title")?.to_string();

                let instructor_ids = data
                    .course(&course_id)
                    .map(|c| c.instructor_ids.clone())
                    .ok_or_else(|| SourceError::NotFound(course_id.clone()))?;

                let thread_id = format!("t{}", data.threads.len() + 1);
                let now = data.now;
                data.threads.push(Thread {
                    id: thread_id.clone(),
                    course_id: course_id.clone(),
                    author_id,
                    title,
                    status: ThreadStatus::Open,
                    views: 0,
                    created_at: now,
                    has_ai_answer: false,
                });

                Ok(json!({
                    "threadId": thread_id,
                    "courseId": course_id,
                    "instructorIds": instructor_ids,
                }))
            }
            "resolve_thread" => {
                let thread_id = payload_str(&command.payload, "threadId")?.to_string();
                let course_id = data
                    .thread(&thread_id)
                    .map(|t| t.course_id.clone())
                    .ok_or_else(|| SourceError::NotFound(thread_id.clone()))?;
                let instructor_ids = data
                    .course(&course_id)
                    .map(|c| c.instructor_ids.clone())
                    .unwrap_or_default();

                if let Some(thread) = data.threads.iter_mut().find(|t| t.id == thread_id) {
                    thread.status = ThreadStatus::Resolved;
                }

                Ok(json!({
                    "threadId": thread_id,
                    "courseId": course_id,
                    "instructorIds": instructor_ids,
                }))
            }
            "mark_notification_read" => {
                let notification_id =
                    payload_str(&command.payload, "notificationId")?.to_string();
                let notification = data
                    .notifications
                    .iter_mut()
                    .find(|n| n.id == notification_id)
                    .ok_or_else(|| SourceError::NotFound(notification_id.clone()))?;
                notification.read = true;
                let user_id = notification.user_id.clone();

                Ok(json!({
                    "notificationId": notification_id,
                    "userId": user_id,
                }))
            }
            other => Err(SourceError::Rejected(format!(
                "unknown operation: {}",
                other
            ))),
        }
    }
}
