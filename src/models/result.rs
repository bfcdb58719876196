// src/models/result.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Represents the 'assignment_results' table: one row per
/// (student, assignment), rolled up from all submissions.
///
/// Best score and percentage only ever grow, `attempts_used` counts
/// submissions exactly, and `passed` is sticky once true.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentResult {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub best_score: i32,
    pub best_percentage: f64,
    pub attempts_used: i32,
    pub passed: bool,
    pub last_attempt_at: chrono::DateTime<chrono::Utc>,
}
