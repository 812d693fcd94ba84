//! Deterministic dataset generation
//!
//! The scaffolding (courses, users, threads, posts, AI answers) is fixed;
//! engagement numbers are drawn from a generator seeded by the caller, so
//! `generate(seed, now)` is a pure function of its inputs.

use crate::engagement;
use crate::model::{
    AiAnswer, Citation, Course, Notification, Post, Role, Thread, ThreadStatus, User,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Seed the demo dataset ships with
pub const DEFAULT_SEED: u64 = 42;

/// Reference "now" the demo dataset is generated against
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 7, 12, 0, 0)
        .single()
        .expect("valid reference timestamp")
}

/// The complete in-memory dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    pub now: DateTime<Utc>,
    pub courses: Vec<Course>,
    pub users: Vec<User>,
    pub threads: Vec<Thread>,
    pub posts: Vec<Post>,
    pub ai_answers: Vec<AiAnswer>,
    pub notifications: Vec<Notification>,
}

struct ThreadSpec {
    course_id: &'static str,
    author_id: &'static str,
    title: &'static str,
    status: ThreadStatus,
    days_old: i64,
    has_ai_answer: bool,
}

struct PostSpec {
    thread_id: &'static str,
    author_id: &'static str,
    body: &'static str,
    endorsed: bool,
}

struct AnswerSpec {
    thread_id: &'static str,
    body: &'static str,
    confidence_score: u32,
    citations: &'static [(&'static str, u32)],
}

const THREADS: &[ThreadSpec] = &[
    ThreadSpec { course_id: "C1", author_id: "S1", title: "Binary search off-by-one in assignment 2", status: ThreadStatus::Resolved, days_old: 12, has_ai_answer: true },
    ThreadSpec { course_id: "C1", author_id: "S2", title: "Clarification on big-O notation", status: ThreadStatus::Answered, days_old: 6, has_ai_answer: true },
    ThreadSpec { course_id: "C1", author_id: "S3", title: "When is office hours this week?", status: ThreadStatus::Open, days_old: 1, has_ai_answer: false },
    ThreadSpec { course_id: "C1", author_id: "S4", title: "Recursion stack depth question", status: ThreadStatus::Answered, days_old: 9, has_ai_answer: true },
    ThreadSpec { course_id: "C2", author_id: "S5", title: "AVL rotation direction confusion", status: ThreadStatus::Resolved, days_old: 15, has_ai_answer: true },
    ThreadSpec { course_id: "C2", author_id: "S1", title: "Hash collision handling in project 1", status: ThreadStatus::Open, days_old: 3, has_ai_answer: true },
    ThreadSpec { course_id: "C2", author_id: "S6", title: "Linked list vs array deque performance", status: ThreadStatus::Answered, days_old: 5, has_ai_answer: true },
    ThreadSpec { course_id: "C3", author_id: "S2", title: "Greedy exchange argument walkthrough", status: ThreadStatus::Open, days_old: 0, has_ai_answer: false },
    ThreadSpec { course_id: "C3", author_id: "S5", title: "Dynamic programming table orientation", status: ThreadStatus::Resolved, days_old: 20, has_ai_answer: true },
];

const POSTS: &[PostSpec] = &[
    PostSpec { thread_id: "t1", author_id: "I1", body: "The loop invariant should use lo <= hi; see the worked example from lecture 3.", endorsed: true },
    PostSpec { thread_id: "t1", author_id: "S2", body: "Switching to lo <= hi fixed the same bug for me.", endorsed: false },
    PostSpec { thread_id: "t2", author_id: "S4", body: "Constants drop out, only the growth term matters.", endorsed: false },
    PostSpec { thread_id: "t4", author_id: "I2", body: "Default stack depth is enough for n up to about 10^4; convert to iteration past that.", endorsed: true },
    PostSpec { thread_id: "t5", author_id: "I3", body: "Rotate toward the taller subtree; the picture in the notes is mirrored.", endorsed: true },
    PostSpec { thread_id: "t5", author_id: "S3", body: "The mirrored picture confused me too, thanks.", endorsed: false },
    PostSpec { thread_id: "t6", author_id: "S4", body: "Chaining was simpler than open addressing for the project tests.", endorsed: false },
    PostSpec { thread_id: "t7", author_id: "S2", body: "Benchmarked both; the deque wins for our sizes.", endorsed: false },
    PostSpec { thread_id: "t9", author_id: "I1", body: "Row-major fill matches the recurrence direction here.", endorsed: true },
];

const ANSWERS: &[AnswerSpec] = &[
    AnswerSpec { thread_id: "t1", body: "The off-by-one comes from an exclusive upper bound paired with an inclusive loop condition.", confidence_score: 92, citations: &[("lecture-3-search.pdf", 95), ("textbook-ch2.pdf", 88)] },
    AnswerSpec { thread_id: "t2", body: "Big-O describes asymptotic growth; lower-order terms and constants are dropped.", confidence_score: 87, citations: &[("lecture-1-intro.pdf", 90), ("syllabus.pdf", 62)] },
    AnswerSpec { thread_id: "t4", body: "Each recursive call adds a frame; depth is bounded by the recursion tree height.", confidence_score: 78, citations: &[("lecture-5-recursion.pdf", 85), ("textbook-ch4.pdf", 82)] },
    AnswerSpec { thread_id: "t5", body: "A left-heavy subtree needs a right rotation; double rotations handle the zig-zag case.", confidence_score: 90, citations: &[("lecture-7-avl.pdf", 90), ("textbook-ch6.pdf", 85)] },
    AnswerSpec { thread_id: "t6", body: "Separate chaining keeps deletion simple at the cost of pointer overhead.", confidence_score: 55, citations: &[("lecture-4-hashing.pdf", 70)] },
    AnswerSpec { thread_id: "t7", body: "The array deque has better cache behavior; the linked list only wins on splice-heavy workloads.", confidence_score: 83, citations: &[("lecture-2-lists.pdf", 88), ("benchmark-notes.pdf", 81)] },
    AnswerSpec { thread_id: "t9", body: "Orient the table so each cell depends only on already-filled cells.", confidence_score: 95, citations: &[("lecture-9-dp.pdf", 96), ("textbook-ch8.pdf", 91), ("recitation-6.pdf", 84)] },
];

impl SeedData {
    /// Build the dataset for `(seed, now)`; same inputs, same data
    pub fn generate(seed: u64, now: DateTime<Utc>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let courses = vec![
            Course {
                id: "C1".to_string(),
                code: "CS101".to_string(),
                name: "Intro to Computer Science".to_string(),
                enrollment_count: 42,
                instructor_ids: vec!["I1".to_string(), "I2".to_string()],
            },
            Course {
                id: "C2".to_string(),
                code: "CS201".to_string(),
                name: "Data Structures".to_string(),
                enrollment_count: 61,
                instructor_ids: vec!["I3".to_string()],
            },
            Course {
                id: "C3".to_string(),
                code: "CS301".to_string(),
                name: "Algorithms Seminar".to_string(),
                enrollment_count: 18,
                instructor_ids: vec!["I1".to_string()],
            },
        ];

        let users = vec![
            user("I1", "Priya Nair", Role::Instructor),
            user("I2", "Marcus Webb", Role::Instructor),
            user("I3", "Elena Rodriguez", Role::Instructor),
            user("S1", "Alex Kim", Role::Student),
            user("S2", "Jordan Patel", Role::Student),
            user("S3", "Sam Okafor", Role::Student),
            user("S4", "Riley Chen", Role::Student),
            user("S5", "Dana Novak", Role::Student),
            user("S6", "Morgan Diaz", Role::Student),
        ];

        let mut threads: Vec<Thread> = THREADS
            .iter()
            .enumerate()
            .map(|(i, spec)| Thread {
                id: format!("t{}", i + 1),
                course_id: spec.course_id.to_string(),
                author_id: spec.author_id.to_string(),
                title: spec.title.to_string(),
                status: spec.status,
                views: 0,
                created_at: now - Duration::days(spec.days_old),
                has_ai_answer: spec.has_ai_answer,
            })
            .collect();

        let posts: Vec<Post> = POSTS
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let thread_created = threads
                    .iter()
                    .find(|t| t.id == spec.thread_id)
                    .map(|t| t.created_at)
                    .unwrap_or(now);
                Post {
                    id: format!("p{}", i + 1),
                    thread_id: spec.thread_id.to_string(),
                    author_id: spec.author_id.to_string(),
                    body: spec.body.to_string(),
                    endorsed: spec.endorsed,
                    created_at: (thread_created + Duration::hours(6)).min(now),
                }
            })
            .collect();

        let mut ai_answers: Vec<AiAnswer> = ANSWERS
            .iter()
            .enumerate()
            .map(|(i, spec)| AiAnswer {
                id: format!("a{}", i + 1),
                thread_id: spec.thread_id.to_string(),
                body: spec.body.to_string(),
                confidence_score: spec.confidence_score,
                citations: spec
                    .citations
                    .iter()
                    .map(|&(source, relevance)| Citation {
                        source: source.to_string(),
                        relevance,
                    })
                    .collect(),
                student_endorsements: 0,
                instructor_endorsements: 0,
                instructor_endorsed: false,
                total_endorsements: 0,
            })
            .collect();

        // apply engagement metrics to threads
        for thread in &mut threads {
            let days_old = (now - thread.created_at).num_days();
            let course_enrollment = courses
                .iter()
                .find(|c| c.id == thread.course_id)
                .map(|c| c.enrollment_count)
                .unwrap_or(0);
            let thread_posts: Vec<&Post> =
                posts.iter().filter(|p| p.thread_id == thread.id).collect();
            let has_instructor_reply = thread_posts.iter().any(|p| {
                users
                    .iter()
                    .any(|u| u.id == p.author_id && u.role == Role::Instructor)
            });

            let base = engagement::base_views(thread.status, &mut rng);
            let quality = engagement::quality_factor(
                thread.has_ai_answer,
                thread_posts.len(),
                thread_posts.iter().any(|p| p.endorsed),
                has_instructor_reply,
                thread.status == ThreadStatus::Resolved,
            );
            thread.views = engagement::thread_views(
                base,
                engagement::age_factor(days_old),
                quality,
                engagement::course_size_factor(course_enrollment),
            );
        }

        // apply endorsement metrics to AI answers
        for answer in &mut ai_answers {
            let (views, days_old) = threads
                .iter()
                .find(|t| t.id == answer.thread_id)
                .map(|t| (t.views, (now - t.created_at).num_days()))
                .unwrap_or((0, 0));

            answer.student_endorsements =
                engagement::student_endorsements(answer.confidence_score, views, &mut rng);
            let endorsed = engagement::instructor_endorses(
                answer.confidence_score,
                &answer.citations,
                views,
                days_old,
                &mut rng,
            );
            answer.instructor_endorsements = u32::from(endorsed);
            answer.instructor_endorsed = endorsed;
            answer.total_endorsements = engagement::total_endorsements(
                answer.student_endorsements,
                answer.instructor_endorsements,
            );
        }

        let notifications = build_notifications(now, &threads, &posts, &users, &courses);

        Self {
            now,
            courses,
            users,
            threads,
            posts,
            ai_answers,
            notifications,
        }
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    pub fn posts_for(&self, thread_id: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| p.thread_id == thread_id)
            .collect()
    }

    pub fn ai_answer_for(&self, thread_id: &str) -> Option<&AiAnswer> {
        self.ai_answers.iter().find(|a| a.thread_id == thread_id)
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }
}

fn user(id: &str, name: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        role,
    }
}

/// Instructors hear about open questions; authors hear about replies
fn build_notifications(
    now: DateTime<Utc>,
    threads: &[Thread],
    posts: &[Post],
    users: &[User],
    courses: &[Course],
) -> Vec<Notification> {
    let mut notifications = Vec::new();
    let mut next_id = 1u32;
    let mut push = |user_id: &str, thread_id: &str, body: String, created_at: DateTime<Utc>| {
        notifications.push(Notification {
            id: format!("n{}", next_id),
            user_id: user_id.to_string(),
            thread_id: thread_id.to_string(),
            body,
            read: (now - created_at) > chrono::Duration::days(7),
            created_at,
        });
        next_id += 1;
    };

    for thread in threads {
        if thread.status == ThreadStatus::Open {
            if let Some(course) = courses.iter().find(|c| c.id == thread.course_id) {
                for instructor_id in &course.instructor_ids {
                    push(
                        instructor_id,
                        &thread.id,
                        format!("New question in {}: {}", course.code, thread.title),
                        thread.created_at,
                    );
                }
            }
        }
    }

    for post in posts {
        let Some(thread) = threads.iter().find(|t| t.id == post.thread_id) else {
            continue;
        };
        // replying to your own thread is not news
        if post.author_id == thread.author_id {
            continue;
        }
        let from_instructor = users
            .iter()
            .any(|u| u.id == post.author_id && u.role == Role::Instructor);
        let body = if from_instructor {
            format!("An instructor replied to \"{}\"", thread.title)
        } else {
            format!("New reply to \"{}\"", thread.title)
        };
        push(&thread.author_id, &thread.id, body, post.created_at);
    }

    notifications
}
