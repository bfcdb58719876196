// src/models/assignment.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'assignments' table: the timed-MCQ configuration
/// attached to a learning part. Contains no answer material, so it is
/// safe to serialize to students as-is.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assignment {
    pub id: i64,

    /// The learning part this assignment backs. One part, one assignment.
    pub part_id: i64,

    pub title: String,
    pub description: Option<String>,

    /// Display total; the scored total is the sum of question marks.
    pub total_marks: i32,

    /// Passing threshold as a percentage (0-100).
    pub passing_marks: i32,

    pub time_limit_minutes: i32,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub show_results_immediately: bool,
    pub allow_review: bool,
    pub is_active: bool,

    pub created_by: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Assignment {
    pub fn time_limit_seconds(&self) -> i32 {
        self.time_limit_minutes.saturating_mul(60)
    }
}

fn default_max_attempts() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

/// DTO for creating an assignment. Staff only.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    pub part_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub passing_marks: i32,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: i32,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub show_results_immediately: bool,
    #[serde(default = "default_true")]
    pub allow_review: bool,
}

/// DTO for updating an assignment. Fields are optional; absent fields are
/// left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub passing_marks: Option<i32>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_results_immediately: Option<bool>,
    pub allow_review: Option<bool>,
    pub is_active: Option<bool>,
}
