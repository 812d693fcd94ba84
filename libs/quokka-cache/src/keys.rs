//! Query key registry for QuokkaQ reads
//!
//! All consumers build keys through these constructors so that logically
//! identical reads land in one cache slot and invalidation can target
//! exactly the affected scope.

use crate::key::QueryKey;

/// Key builder for every cacheable QuokkaQ read
pub struct QueryKeys;

impl QueryKeys {
    // ============= Course keys =============

    /// Course detail
    /// Format: course:{course_id}
    pub fn course(course_id: &str) -> QueryKey {
        QueryKey::entity_key("course").text(course_id)
    }

    /// Instructors and enrollment for a course
    /// Format: courseRoster:{course_id}
    pub fn course_roster(course_id: &str) -> QueryKey {
        QueryKey::entity_key("courseRoster").text(course_id)
    }

    /// Thread listing for a course
    /// Format: courseThreads:{course_id}
    pub fn course_threads(course_id: &str) -> QueryKey {
        QueryKey::entity_key("courseThreads").text(course_id)
    }

    /// Aggregated activity metrics for a course
    /// Format: courseMetrics:{course_id}
    pub fn course_metrics(course_id: &str) -> QueryKey {
        QueryKey::entity_key("courseMetrics").text(course_id)
    }

    // ============= Thread keys =============

    /// Thread detail with posts
    /// Format: thread:{thread_id}
    pub fn thread(thread_id: &str) -> QueryKey {
        QueryKey::entity_key("thread").text(thread_id)
    }

    /// AI answer for a thread
    /// Format: aiAnswer:{thread_id}
    pub fn ai_answer(thread_id: &str) -> QueryKey {
        QueryKey::entity_key("aiAnswer").text(thread_id)
    }

    /// Thread search within a course; the query text is normalized so
    /// "Binary Search" and "binary search" share one slot
    /// Format: threadSearch:{course_id}:{normalized_query}
    pub fn thread_search(course_id: &str, query: &str) -> QueryKey {
        QueryKey::entity_key("threadSearch")
            .text(course_id)
            .search_text(query)
    }

    // ============= Dashboard keys =============

    /// Instructor dashboard for one user
    /// Format: instructorDashboard:{user_id}
    pub fn instructor_dashboard(user_id: &str) -> QueryKey {
        QueryKey::entity_key("instructorDashboard").text(user_id)
    }

    /// Student dashboard for one user
    /// Format: studentDashboard:{user_id}
    pub fn student_dashboard(user_id: &str) -> QueryKey {
        QueryKey::entity_key("studentDashboard").text(user_id)
    }

    /// Prefix covering every instructor dashboard
    ///
    /// Escape hatch for the rare change that genuinely affects all
    /// instructors (e.g. a term rollover). Scoped mutations must compute
    /// the affected instructor ids and invalidate those dashboards only.
    pub fn all_instructor_dashboards() -> QueryKey {
        QueryKey::entity_key("instructorDashboard")
    }

    // ============= Notification keys =============

    /// Notification feed for one user
    /// Format: notifications:{user_id}
    pub fn notifications(user_id: &str) -> QueryKey {
        QueryKey::entity_key("notifications").text(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_key() {
        let key = QueryKeys::course("C1");
        assert_eq!(key.to_string(), "course:C1");
        assert_eq!(key.entity(), "course");
    }

    #[test]
    fn test_dashboard_keys_are_scoped_per_user() {
        let a = QueryKeys::instructor_dashboard("I1");
        let b = QueryKeys::instructor_dashboard("I2");
        assert_ne!(a, b);

        let prefix = QueryKeys::all_instructor_dashboards();
        assert!(a.starts_with(&prefix));
        assert!(b.starts_with(&prefix));
        assert!(!QueryKeys::student_dashboard("I1").starts_with(&prefix));
    }

    #[test]
    fn test_thread_search_normalizes_query() {
        let a = QueryKeys::thread_search("C1", "Binary Search");
        let b = QueryKeys::thread_search("C1", "binary search");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "threadSearch:C1:binary search");

        assert_ne!(a, QueryKeys::thread_search("C2", "binary search"));
    }
}
