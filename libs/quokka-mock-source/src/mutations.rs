//! Canned mutation specs for the QuokkaQ write operations
//!
//! Each spec pairs the write command with its optimistic update and a
//! narrow invalidation set computed from the result payload: the affected
//! thread and course, and the dashboards of that course's instructors —
//! never every instructor in the system.

use crate::model::Role;
use crate::MockDataSource;
use quokka_cache::{
    DataSource, MutationSpec, OptimisticUpdate, QueryKey, QueryKeys, WriteCommand,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Dashboards of the instructors named in a write result
fn instructor_dashboards(result: &Value) -> Vec<QueryKey> {
    result["instructorIds"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(QueryKeys::instructor_dashboard)
        .collect()
}

/// Endorse the AI answer on a thread
///
/// Optimistically bumps the endorsement total on the cached answer; on
/// commit invalidates the answer, its thread and course listings, and the
/// dashboards of the instructors teaching that course.
pub fn endorse_answer(
    source: Arc<MockDataSource>,
    thread_id: &str,
    user_id: &str,
    role: Role,
) -> MutationSpec {
    let answer_key = QueryKeys::ai_answer(thread_id);
    let thread_id = thread_id.to_string();
    let command = WriteCommand::new(
        "endorse_answer",
        json!({ "threadId": thread_id.clone(), "userId": user_id, "role": role }),
    );

    MutationSpec::via_source(source as Arc<dyn DataSource>, command)
        .optimistic(OptimisticUpdate::new(answer_key, move |old| {
            let mut value = old.cloned().unwrap_or_else(|| json!({}));
            let total = value["totalEndorsements"].as_u64().unwrap_or(0) + 1;
            value["totalEndorsements"] = json!(total);
            if role == Role::Instructor {
                value["instructorEndorsed"] = json!(true);
            }
            value
        }))
        .invalidates(move |result| {
            let mut keys = vec![
                QueryKeys::ai_answer(&thread_id),
                QueryKeys::thread(&thread_id),
            ];
            if let Some(course_id) = result["courseId"].as_str() {
                keys.push(QueryKeys::course_threads(course_id));
                keys.push(QueryKeys::course_metrics(course_id));
            }
            keys.extend(instructor_dashboards(result));
            keys
        })
}

/// Post a new question thread in a course
pub fn create_thread(
    source: Arc<MockDataSource>,
    course_id: &str,
    author_id: &str,
    title: &str,
) -> MutationSpec {
    let threads_key = QueryKeys::course_threads(course_id);
    let command = WriteCommand::new(
        "create_thread",
        json!({ "courseId": course_id, "authorId": author_id, "title": title }),
    );
    let author_id = author_id.to_string();
    let optimistic_thread = json!({
        "id": "pending",
        "courseId": course_id,
        "authorId": author_id.clone(),
        "title": title,
        "status": "open",
        "views": 0,
    });

    MutationSpec::via_source(source as Arc<dyn DataSource>, command)
        .optimistic(OptimisticUpdate::new(threads_key, move |old| {
            // append a provisional row; the refetch replaces it with the
            // server-assigned id
            let mut threads = old
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            threads.push(optimistic_thread.clone());
            Value::Array(threads)
        }))
        .invalidates(move |result| {
            let mut keys = Vec::new();
            if let Some(course_id) = result["courseId"].as_str() {
                keys.push(QueryKeys::course_threads(course_id));
                keys.push(QueryKeys::course_metrics(course_id));
            }
            keys.push(QueryKeys::student_dashboard(&author_id));
            keys.extend(instructor_dashboards(result));
            keys
        })
}

/// Mark a thread resolved
pub fn resolve_thread(source: Arc<MockDataSource>, thread_id: &str) -> MutationSpec {
    let thread_key = QueryKeys::thread(thread_id);
    let thread_id = thread_id.to_string();
    let command = WriteCommand::new("resolve_thread", json!({ "threadId": thread_id.clone() }));

    MutationSpec::via_source(source as Arc<dyn DataSource>, command)
        .optimistic(OptimisticUpdate::new(thread_key, |old| {
            let mut value = old.cloned().unwrap_or_else(|| json!({}));
            value["thread"]["status"] = json!("resolved");
            value
        }))
        .invalidates(move |result| {
            let mut keys = vec![QueryKeys::thread(&thread_id)];
            if let Some(course_id) = result["courseId"].as_str() {
                keys.push(QueryKeys::course_threads(course_id));
                keys.push(QueryKeys::course_metrics(course_id));
            }
            keys.extend(instructor_dashboards(result));
            keys
        })
}

/// Mark one notification read
pub fn mark_notification_read(
    source: Arc<MockDataSource>,
    notification_id: &str,
    user_id: &str,
) -> MutationSpec {
    let notifications_key = QueryKeys::notifications(user_id);
    let notification_id_owned = notification_id.to_string();
    let user_id = user_id.to_string();
    let command = WriteCommand::new(
        "mark_notification_read",
        json!({ "notificationId": notification_id }),
    );

    MutationSpec::via_source(source as Arc<dyn DataSource>, command)
        .optimistic(OptimisticUpdate::new(notifications_key, move |old| {
            let mut notifications = old
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            for notification in &mut notifications {
                if notification["id"] == notification_id_owned.as_str() {
                    notification["read"] = json!(true);
                }
            }
            Value::Array(notifications)
        }))
        .invalidates(move |_| vec![QueryKeys::notifications(&user_id)])
}
