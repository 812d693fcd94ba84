//! QuokkaQ domain model
//!
//! Field names serialize in camelCase to match the wire shapes the
//! dashboards consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Answered,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub enrollment_count: u32,
    pub instructor_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub course_id: String,
    pub author_id: String,
    pub title: String,
    pub status: ThreadStatus,
    pub views: u32,
    pub created_at: DateTime<Utc>,
    pub has_ai_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub body: String,
    pub endorsed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub source: String,
    /// Relevance score 0-100
    pub relevance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnswer {
    pub id: String,
    pub thread_id: String,
    pub body: String,
    /// Model confidence 0-100
    pub confidence_score: u32,
    pub citations: Vec<Citation>,
    pub student_endorsements: u32,
    pub instructor_endorsements: u32,
    pub instructor_endorsed: bool,
    pub total_endorsements: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub thread_id: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-course activity line on a dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseActivity {
    pub course_id: String,
    pub open_threads: u32,
    pub unanswered_threads: u32,
    pub pending_ai_reviews: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub user_id: String,
    pub courses: Vec<CourseActivity>,
    pub unread_notifications: u32,
    /// Thread and post counts per week, oldest first
    pub weekly_activity: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMetrics {
    pub course_id: String,
    /// Sparkline buckets per week, oldest first
    pub weekly_posts: Vec<u32>,
    pub resolution_rate: f64,
    pub total_views: u32,
}
