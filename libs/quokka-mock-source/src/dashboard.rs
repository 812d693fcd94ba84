//! Dashboard and metrics aggregation over the seeded dataset

use crate::model::{
    CourseActivity, CourseMetrics, DashboardSummary, Role, ThreadStatus,
};
use crate::seed::SeedData;
use chrono::{DateTime, Utc};

/// Number of weekly sparkline buckets
const WEEKS: usize = 8;

/// Activity summary for an instructor: every course they teach
pub fn instructor_dashboard(data: &SeedData, user_id: &str) -> DashboardSummary {
    let course_ids: Vec<String> = data
        .courses
        .iter()
        .filter(|c| c.instructor_ids.iter().any(|i| i == user_id))
        .map(|c| c.id.clone())
        .collect();

    DashboardSummary {
        user_id: user_id.to_string(),
        courses: course_ids
            .iter()
            .map(|course_id| course_activity(data, course_id))
            .collect(),
        unread_notifications: unread_count(data, user_id),
        weekly_activity: weekly_buckets(data, &course_ids),
    }
}

/// Activity summary for a student: every course they have posted in
pub fn student_dashboard(data: &SeedData, user_id: &str) -> DashboardSummary {
    let mut course_ids: Vec<String> = Vec::new();
    for thread in &data.threads {
        let authored_thread = thread.author_id == user_id;
        let authored_post = data
            .posts_for(&thread.id)
            .iter()
            .any(|p| p.author_id == user_id);
        if (authored_thread || authored_post) && !course_ids.contains(&thread.course_id) {
            course_ids.push(thread.course_id.clone());
        }
    }

    DashboardSummary {
        user_id: user_id.to_string(),
        courses: course_ids
            .iter()
            .map(|course_id| course_activity(data, course_id))
            .collect(),
        unread_notifications: unread_count(data, user_id),
        weekly_activity: weekly_buckets(data, &course_ids),
    }
}

/// Aggregated metrics for one course
pub fn course_metrics(data: &SeedData, course_id: &str) -> CourseMetrics {
    let threads: Vec<_> = data
        .threads
        .iter()
        .filter(|t| t.course_id == course_id)
        .collect();
    let resolved = threads
        .iter()
        .filter(|t| t.status == ThreadStatus::Resolved)
        .count();
    let resolution_rate = if threads.is_empty() {
        0.0
    } else {
        resolved as f64 / threads.len() as f64
    };

    CourseMetrics {
        course_id: course_id.to_string(),
        weekly_posts: weekly_buckets(data, &[course_id.to_string()]),
        resolution_rate,
        total_views: threads.iter().map(|t| t.views).sum(),
    }
}

fn course_activity(data: &SeedData, course_id: &str) -> CourseActivity {
    let threads: Vec<_> = data
        .threads
        .iter()
        .filter(|t| t.course_id == course_id)
        .collect();

    let open_threads = threads
        .iter()
        .filter(|t| t.status == ThreadStatus::Open)
        .count() as u32;

    // open, no replies, and no AI answer to lean on
    let unanswered_threads = threads
        .iter()
        .filter(|t| {
            t.status == ThreadStatus::Open
                && !t.has_ai_answer
                && data.posts_for(&t.id).is_empty()
        })
        .count() as u32;

    // confident AI answers still waiting on an instructor review
    let pending_ai_reviews = threads
        .iter()
        .filter_map(|t| data.ai_answer_for(&t.id))
        .filter(|a| a.confidence_score >= 80 && !a.instructor_endorsed)
        .count() as u32;

    CourseActivity {
        course_id: course_id.to_string(),
        open_threads,
        unanswered_threads,
        pending_ai_reviews,
    }
}

fn unread_count(data: &SeedData, user_id: &str) -> u32 {
    data.notifications
        .iter()
        .filter(|n| n.user_id == user_id && !n.read)
        .count() as u32
}

/// Thread and post counts per week over the trailing window, oldest first
fn weekly_buckets(data: &SeedData, course_ids: &[String]) -> Vec<u32> {
    let mut buckets = vec![0u32; WEEKS];
    let mut count = |created_at: DateTime<Utc>| {
        let age_days = (data.now - created_at).num_days();
        if age_days < 0 {
            return;
        }
        let weeks_back = (age_days / 7) as usize;
        if weeks_back < WEEKS {
            buckets[WEEKS - 1 - weeks_back] += 1;
        }
    };

    for thread in &data.threads {
        if course_ids.contains(&thread.course_id) {
            count(thread.created_at);
        }
    }
    for post in &data.posts {
        if let Some(thread) = data.thread(&post.thread_id) {
            if course_ids.contains(&thread.course_id) {
                count(post.created_at);
            }
        }
    }

    buckets
}

/// True if any instructor has replied in the thread
pub fn has_instructor_reply(data: &SeedData, thread_id: &str) -> bool {
    data.posts_for(thread_id).iter().any(|p| {
        data.user(&p.author_id)
            .map(|u| u.role == Role::Instructor)
            .unwrap_or(false)
    })
}
