// src/store/mod.rs

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::assignment::Assignment;
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::question::{OptionKey, Question, QuestionType};
use crate::models::result::AssignmentResult;
use crate::models::submission::{AnswerMap, ReviewEntry, Submission};
use crate::models::user::User;

pub use memory::MemStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// A uniqueness rule was violated: duplicate username, a second
    /// in-progress attempt, or a second submission for the same attempt.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisted data failed to decode (broken answer key, unknown enum
    /// tag). Surfacing this fails the whole operation; a partially-scored
    /// assignment is worse than a rejected one.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Fields for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: String,
}

/// Fields for a new assignment row.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub part_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub time_limit_minutes: i32,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub show_results_immediately: bool,
    pub allow_review: bool,
    pub created_by: Option<i64>,
}

/// Partial assignment update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub passing_marks: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_results_immediately: Option<bool>,
    pub allow_review: Option<bool>,
    pub is_active: Option<bool>,
}

/// Fields for a new question row. The answer key is already parsed; the
/// store encodes it for persistence.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub assignment_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub option_a: String,
    pub option_b: String,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub option_e: Option<String>,
    pub correct_answers: BTreeSet<OptionKey>,
    pub marks: i32,
    pub explanation: Option<String>,
    pub question_order: i32,
}

/// Fields for a new attempt row. The attempt number is allocated by the
/// store, atomically per (assignment, student).
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub assignment_id: i64,
    pub student_id: i64,
    pub time_remaining_seconds: i32,
    pub question_order: Vec<i64>,
}

/// Fields for a new submission row.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub assignment_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub answers: AnswerMap,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub time_taken_seconds: i32,
    pub review_data: Vec<ReviewEntry>,
}

/// Storage handle injected into every component.
///
/// Two implementations: [`PgStore`] for production and [`MemStore`] as a
/// test double with the same constraint semantics. Methods that back a
/// concurrency-sensitive invariant (attempt-number allocation, the result
/// upsert) are atomic per key in both implementations.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    // assignments
    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, StoreError>;
    async fn update_assignment(
        &self,
        id: i64,
        patch: AssignmentPatch,
    ) -> Result<Assignment, StoreError>;
    async fn delete_assignment(&self, id: i64) -> Result<(), StoreError>;
    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, StoreError>;
    async fn find_assignment_by_part(&self, part_id: i64)
    -> Result<Option<Assignment>, StoreError>;

    // question bank
    async fn create_question(&self, new: NewQuestion) -> Result<Question, StoreError>;
    async fn update_question(&self, id: i64, new: NewQuestion) -> Result<Question, StoreError>;
    async fn delete_question(&self, id: i64) -> Result<(), StoreError>;
    async fn find_question(&self, id: i64) -> Result<Option<Question>, StoreError>;
    /// Active questions of an assignment, ordered by `question_order`.
    async fn list_questions(&self, assignment_id: i64) -> Result<Vec<Question>, StoreError>;

    // attempts
    /// Inserts a new attempt with `attempt_number = max(existing) + 1`.
    /// Returns `Conflict` when an in-progress attempt already exists.
    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError>;
    async fn find_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError>;
    async fn find_active_attempt(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<Attempt>, StoreError>;
    async fn count_active_attempts(&self, assignment_id: i64) -> Result<i64, StoreError>;
    async fn update_attempt_time(&self, id: i64, seconds: i32) -> Result<(), StoreError>;
    /// Terminal transition; the attempt must currently be in progress.
    async fn complete_attempt(
        &self,
        id: i64,
        status: AttemptStatus,
        end_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StoreError>;

    // submissions
    /// Returns `Conflict` when the attempt already has a submission.
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError>;
    async fn count_submissions(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<i64, StoreError>;
    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError>;

    // results
    /// Atomic best-of upsert: greatest score/percentage win, attempts_used
    /// increments, passed is sticky.
    async fn upsert_result(
        &self,
        assignment_id: i64,
        student_id: i64,
        score: i32,
        percentage: f64,
        passed: bool,
    ) -> Result<AssignmentResult, StoreError>;
    async fn find_result(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<AssignmentResult>, StoreError>;

    // content-completion sink
    async fn mark_part_completed(&self, part_id: i64, student_id: i64) -> Result<(), StoreError>;
}
