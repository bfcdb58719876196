// src/models/submission.rs

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;

use crate::models::question::OptionKey;

/// User's answers map. Key: question id. Value: selected option(s).
pub type AnswerMap = HashMap<i64, AnswerSelection>;

/// A student's selection for one question: a bare letter for
/// single-choice, an array of letters for multiple-choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSelection {
    One(String),
    Many(Vec<String>),
}

impl AnswerSelection {
    /// The selected letters as a set. Unrecognized letters are dropped:
    /// student input is lenient, only the answer key is strict.
    pub fn keys(&self) -> BTreeSet<OptionKey> {
        match self {
            AnswerSelection::One(s) => OptionKey::parse(s).into_iter().collect(),
            AnswerSelection::Many(items) => {
                items.iter().filter_map(|s| OptionKey::parse(s)).collect()
            }
        }
    }

}

/// Per-question correctness detail, stored with the submission and
/// returned to the student when review is allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub question_id: i64,
    pub correct: bool,
    pub student_answer: Option<AnswerSelection>,
    pub correct_answers: Vec<OptionKey>,
    pub marks_obtained: i32,
    pub question_marks: i32,
    pub explanation: Option<String>,
}

/// The scored record written when an attempt ends. Immutable once
/// written; each attempt yields at most one submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub answers: AnswerMap,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub time_taken_seconds: i32,
    pub review_data: Option<Vec<ReviewEntry>>,
    pub status: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Raw `assignment_submissions` row.
#[derive(Debug, FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub answers: Json<AnswerMap>,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub time_taken_seconds: i32,
    pub review_data: Option<Json<Vec<ReviewEntry>>>,
    pub status: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            assignment_id: row.assignment_id,
            student_id: row.student_id,
            attempt_number: row.attempt_number,
            answers: row.answers.0,
            score: row.score,
            total_marks: row.total_marks,
            percentage: row.percentage,
            time_taken_seconds: row.time_taken_seconds,
            review_data: row.review_data.map(|j| j.0),
            status: row.status,
            submitted_at: row.submitted_at,
        }
    }
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: AnswerMap,
}

/// Rolled-up standing of the student on this assignment, included in the
/// submit response.
#[derive(Debug, Serialize)]
pub struct ResultsSummary {
    pub best_score: i32,
    pub best_percentage: f64,
    pub attempts_used: i32,
    pub max_attempts: i32,
    pub passed: bool,
}

/// Response body for a submit (or timeout finalization).
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: i64,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub passed: bool,
    pub time_taken_seconds: i32,
    /// Null unless the assignment shows results immediately and allows review.
    pub review_data: Option<Vec<ReviewEntry>>,
    pub results_summary: ResultsSummary,
}
