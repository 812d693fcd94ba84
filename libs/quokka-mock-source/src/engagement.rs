//! Engagement metrics applied to the seeded dataset
//!
//! Views grow with thread age and quality and shrink for small courses;
//! AI answer endorsements scale with model confidence and reach. All
//! random draws come from the caller's seeded generator, so the same
//! seed always yields the same dataset.

use crate::model::{Citation, ThreadStatus};
use rand::Rng;

/// Small courses see less traffic, large ones more
pub fn course_size_factor(enrollment_count: u32) -> f64 {
    if enrollment_count < 35 {
        0.8
    } else if enrollment_count <= 50 {
        1.0
    } else {
        1.3
    }
}

/// Baseline view count by thread status
pub fn base_views(status: ThreadStatus, rng: &mut impl Rng) -> u32 {
    match status {
        ThreadStatus::Resolved => rng.gen_range(20..=35),
        ThreadStatus::Answered => rng.gen_range(15..=25),
        ThreadStatus::Open => rng.gen_range(8..=15),
    }
}

/// Views accumulate with age, capped at 2.5x
pub fn age_factor(days_old: i64) -> f64 {
    (1.0 + (days_old as f64 / 7.0) * 0.5).min(2.5)
}

/// Quality multiplier over a 1.0 base
pub fn quality_factor(
    has_ai_answer: bool,
    reply_count: usize,
    has_endorsed_reply: bool,
    has_instructor_reply: bool,
    resolved: bool,
) -> f64 {
    let mut score = 0.0;
    if has_ai_answer {
        score += 0.3;
    }
    if reply_count > 0 {
        score += 0.2;
    }
    if has_endorsed_reply {
        score += 0.3;
    }
    if has_instructor_reply {
        score += 0.2;
    }
    if resolved {
        score += 0.25;
    }
    1.0 + score
}

/// Combine the factors into a view count, capped at 200
pub fn thread_views(base: u32, age: f64, quality: f64, size: f64) -> u32 {
    let calculated = (base as f64 * age * quality * size) as u32;
    calculated.min(200)
}

/// Student endorsements for an AI answer, by confidence band
pub fn student_endorsements(confidence_score: u32, thread_views: u32, rng: &mut impl Rng) -> u32 {
    let confidence = confidence_score as f64 / 100.0;
    let views = thread_views as f64;

    let base = if confidence_score >= 85 {
        confidence * (views / 10.0) * rng.gen_range(0.3..0.6)
    } else if confidence_score >= 60 {
        confidence * (views / 20.0) * rng.gen_range(0.2..0.4)
    } else {
        rng.gen_range(0.0..2.0)
    };

    base.max(0.0) as u32
}

/// Whether an instructor endorses an AI answer
///
/// Requires high confidence, at least two quality citations, some age,
/// and real readership; 40% of qualifying answers get the endorsement.
pub fn instructor_endorses(
    confidence_score: u32,
    citations: &[Citation],
    thread_views: u32,
    days_old: i64,
    rng: &mut impl Rng,
) -> bool {
    if confidence_score < 80 {
        return false;
    }
    let quality_citations = citations.iter().filter(|c| c.relevance >= 80).count();
    if quality_citations < 2 {
        return false;
    }
    if days_old < 1 {
        return false;
    }
    if thread_views < 20 {
        return false;
    }
    rng.gen::<f64>() < 0.4
}

/// Instructor endorsement boosts the total by 30% of the student count
pub fn total_endorsements(student: u32, instructor: u32) -> u32 {
    let mut total = student + instructor;
    if instructor > 0 {
        total += (student as f64 * 0.3) as u32;
    }
    total
}
