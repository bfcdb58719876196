// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;

use crate::models::question::PublicQuestion;
use crate::models::submission::AnswerMap;

/// Lifecycle state of an attempt.
///
/// `InProgress` is the only non-terminal state: an attempt always starts
/// there and moves exactly once, to `Completed` (explicit submit) or
/// `TimedOut` (clock expiry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            "timed_out" => Some(AttemptStatus::TimedOut),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// One student's pass at an assignment.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,

    /// 1-based, strictly increasing per (student, assignment). Allocated
    /// by the store, never taken from the client.
    pub attempt_number: i32,

    pub status: AttemptStatus,
    pub time_remaining_seconds: i32,

    /// Question ids in the order served at start; resume replays this.
    pub question_order: Vec<i64>,

    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Raw `assignment_attempts` row.
#[derive(Debug, FromRow)]
pub struct AttemptRow {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub status: String,
    pub time_remaining_seconds: i32,
    pub question_order: Json<Vec<i64>>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = String;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = AttemptStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown attempt status '{}'", row.status))?;
        Ok(Attempt {
            id: row.id,
            assignment_id: row.assignment_id,
            student_id: row.student_id,
            attempt_number: row.attempt_number,
            status,
            time_remaining_seconds: row.time_remaining_seconds,
            question_order: row.question_order.0,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

/// Response body for a start (or resume) call. Questions are answer-free.
#[derive(Debug, Serialize)]
pub struct StartAssignmentResponse {
    pub assignment: crate::models::assignment::Assignment,
    pub attempt: Attempt,
    pub questions: Vec<PublicQuestion>,
    pub total_questions: usize,
    pub time_limit_seconds: i32,
    pub resumed: bool,
}

/// Advisory time update from the client heartbeat.
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub time_remaining_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub time_remaining_seconds: i32,
}

/// Auto-save checkpoint. May carry the current answers so that a timeout
/// observed here can still score the student's last-known work.
#[derive(Debug, Deserialize)]
pub struct AutoSaveRequest {
    pub time_remaining_seconds: i32,
    #[serde(default)]
    pub answers: Option<AnswerMap>,
}
