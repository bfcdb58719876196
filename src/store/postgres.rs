// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::models::assignment::Assignment;
use crate::models::attempt::{Attempt, AttemptRow, AttemptStatus};
use crate::models::question::{Question, QuestionRow, encode_answer_key};
use crate::models::result::AssignmentResult;
use crate::models::submission::{Submission, SubmissionRow};
use crate::models::user::User;

use super::{
    AssignmentPatch, NewAssignment, NewAttempt, NewQuestion, NewSubmission, NewUser, Store,
    StoreError,
};

const ASSIGNMENT_COLS: &str = "id, part_id, title, description, total_marks, passing_marks, \
     time_limit_minutes, max_attempts, shuffle_questions, show_results_immediately, \
     allow_review, is_active, created_by, created_at";

const QUESTION_COLS: &str = "id, assignment_id, question_text, question_type, option_a, option_b, \
     option_c, option_d, option_e, correct_answers, marks, explanation, question_order, is_active";

const ATTEMPT_COLS: &str = "id, assignment_id, student_id, attempt_number, status, \
     time_remaining_seconds, question_order, start_time, end_time";

const SUBMISSION_COLS: &str = "id, assignment_id, student_id, attempt_number, answers, score, \
     total_marks, percentage, time_taken_seconds, review_data, status, submitted_at";

const RESULT_COLS: &str =
    "id, assignment_id, student_id, best_score, best_percentage, attempts_used, passed, \
     last_attempt_at";

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Name of the violated constraint, if this is a database-side violation.
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}

fn attempt_from_row(row: AttemptRow) -> Result<Attempt, StoreError> {
    Attempt::try_from(row).map_err(StoreError::Corrupt)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) \
             RETURNING id, username, password, role, created_at";
        sqlx::query_as::<_, User>(sql)
            .bind(&new.username)
            .bind(&new.password)
            .bind(&new.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some("users_username_key") {
                    StoreError::Conflict(format!("Username '{}' already exists", new.username))
                } else {
                    e.into()
                }
            })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = "SELECT id, username, password, role, created_at FROM users WHERE username = $1";
        Ok(sqlx::query_as::<_, User>(sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = "SELECT id, username, password, role, created_at FROM users WHERE id = $1";
        Ok(sqlx::query_as::<_, User>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, StoreError> {
        let sql = format!(
            "INSERT INTO assignments (part_id, title, description, total_marks, passing_marks, \
             time_limit_minutes, max_attempts, shuffle_questions, show_results_immediately, \
             allow_review, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ASSIGNMENT_COLS}"
        );
        sqlx::query_as::<_, Assignment>(&sql)
            .bind(new.part_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.total_marks)
            .bind(new.passing_marks)
            .bind(new.time_limit_minutes)
            .bind(new.max_attempts)
            .bind(new.shuffle_questions)
            .bind(new.show_results_immediately)
            .bind(new.allow_review)
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some("assignments_part_id_key") {
                    StoreError::Conflict("Learning part already has an assignment".to_string())
                } else {
                    e.into()
                }
            })
    }

    async fn update_assignment(
        &self,
        id: i64,
        patch: AssignmentPatch,
    ) -> Result<Assignment, StoreError> {
        let sql = format!(
            "UPDATE assignments SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                passing_marks = COALESCE($4, passing_marks), \
                time_limit_minutes = COALESCE($5, time_limit_minutes), \
                max_attempts = COALESCE($6, max_attempts), \
                shuffle_questions = COALESCE($7, shuffle_questions), \
                show_results_immediately = COALESCE($8, show_results_immediately), \
                allow_review = COALESCE($9, allow_review), \
                is_active = COALESCE($10, is_active) \
             WHERE id = $1 \
             RETURNING {ASSIGNMENT_COLS}"
        );
        sqlx::query_as::<_, Assignment>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.description)
            .bind(patch.passing_marks)
            .bind(patch.time_limit_minutes)
            .bind(patch.max_attempts)
            .bind(patch.shuffle_questions)
            .bind(patch.show_results_immediately)
            .bind(patch.allow_review)
            .bind(patch.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_assignment(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, StoreError> {
        let sql = format!("SELECT {ASSIGNMENT_COLS} FROM assignments WHERE id = $1");
        Ok(sqlx::query_as::<_, Assignment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_assignment_by_part(
        &self,
        part_id: i64,
    ) -> Result<Option<Assignment>, StoreError> {
        let sql = format!("SELECT {ASSIGNMENT_COLS} FROM assignments WHERE part_id = $1");
        Ok(sqlx::query_as::<_, Assignment>(&sql)
            .bind(part_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, StoreError> {
        let sql = format!(
            "INSERT INTO assignment_questions (assignment_id, question_text, question_type, \
             option_a, option_b, option_c, option_d, option_e, correct_answers, marks, \
             explanation, question_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {QUESTION_COLS}"
        );
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(new.assignment_id)
            .bind(&new.question_text)
            .bind(new.question_type.as_str())
            .bind(&new.option_a)
            .bind(&new.option_b)
            .bind(&new.option_c)
            .bind(&new.option_d)
            .bind(&new.option_e)
            .bind(encode_answer_key(&new.correct_answers))
            .bind(new.marks)
            .bind(&new.explanation)
            .bind(new.question_order)
            .fetch_one(&self.pool)
            .await?;
        Question::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn update_question(&self, id: i64, new: NewQuestion) -> Result<Question, StoreError> {
        let sql = format!(
            "UPDATE assignment_questions SET question_text = $2, question_type = $3, \
             option_a = $4, option_b = $5, option_c = $6, option_d = $7, option_e = $8, \
             correct_answers = $9, marks = $10, explanation = $11, question_order = $12 \
             WHERE id = $1 \
             RETURNING {QUESTION_COLS}"
        );
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .bind(&new.question_text)
            .bind(new.question_type.as_str())
            .bind(&new.option_a)
            .bind(&new.option_b)
            .bind(&new.option_c)
            .bind(&new.option_d)
            .bind(&new.option_e)
            .bind(encode_answer_key(&new.correct_answers))
            .bind(new.marks)
            .bind(&new.explanation)
            .bind(new.question_order)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Question::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn delete_question(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM assignment_questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        let sql = format!("SELECT {QUESTION_COLS} FROM assignment_questions WHERE id = $1");
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Question::try_from(r).map_err(StoreError::Corrupt))
            .transpose()
    }

    async fn list_questions(&self, assignment_id: i64) -> Result<Vec<Question>, StoreError> {
        let sql = format!(
            "SELECT {QUESTION_COLS} FROM assignment_questions \
             WHERE assignment_id = $1 AND is_active = TRUE \
             ORDER BY question_order, id"
        );
        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(assignment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Question::try_from(row).map_err(StoreError::Corrupt))
            .collect()
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError> {
        let sql = format!(
            "INSERT INTO assignment_attempts (assignment_id, student_id, attempt_number, status, \
             time_remaining_seconds, question_order) \
             SELECT $1, $2, COALESCE(MAX(attempt_number), 0) + 1, 'in_progress', $3, $4 \
             FROM assignment_attempts WHERE assignment_id = $1 AND student_id = $2 \
             RETURNING {ATTEMPT_COLS}"
        );
        // The MAX+1 allocation can lose a race; the unique constraint
        // catches it and the insert is retried with a fresh number. A
        // violation of the one-active index instead means an in-progress
        // attempt exists and is the caller's cue to resume it.
        for _ in 0..3 {
            let res = sqlx::query_as::<_, AttemptRow>(&sql)
                .bind(new.assignment_id)
                .bind(new.student_id)
                .bind(new.time_remaining_seconds)
                .bind(Json(&new.question_order))
                .fetch_one(&self.pool)
                .await;
            match res {
                Ok(row) => return attempt_from_row(row),
                Err(e) => match violated_constraint(&e) {
                    Some("assignment_attempts_one_active_idx") => {
                        return Err(StoreError::Conflict(
                            "An attempt is already in progress".to_string(),
                        ));
                    }
                    Some("assignment_attempts_number_key") => continue,
                    _ => return Err(e.into()),
                },
            }
        }
        Err(StoreError::Conflict(
            "Could not allocate an attempt number".to_string(),
        ))
    }

    async fn find_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        let sql = format!("SELECT {ATTEMPT_COLS} FROM assignment_attempts WHERE id = $1");
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(attempt_from_row).transpose()
    }

    async fn find_active_attempt(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLS} FROM assignment_attempts \
             WHERE assignment_id = $1 AND student_id = $2 AND status = 'in_progress'"
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(assignment_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(attempt_from_row).transpose()
    }

    async fn count_active_attempts(&self, assignment_id: i64) -> Result<i64, StoreError> {
        let sql = "SELECT COUNT(*) FROM assignment_attempts \
             WHERE assignment_id = $1 AND status = 'in_progress'";
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .bind(assignment_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_attempt_time(&self, id: i64, seconds: i32) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE assignment_attempts SET time_remaining_seconds = $2 \
             WHERE id = $1 AND status = 'in_progress'",
        )
        .bind(id)
        .bind(seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_attempt(
        &self,
        id: i64,
        status: AttemptStatus,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE assignment_attempts SET status = $2, end_time = $3 \
             WHERE id = $1 AND status = 'in_progress'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(end_time)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Conflict(
                "Attempt is already finalized".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let sql = format!(
            "INSERT INTO assignment_submissions (assignment_id, student_id, attempt_number, \
             answers, score, total_marks, percentage, time_taken_seconds, review_data, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'submitted') \
             RETURNING {SUBMISSION_COLS}"
        );
        let row = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(new.assignment_id)
            .bind(new.student_id)
            .bind(new.attempt_number)
            .bind(Json(&new.answers))
            .bind(new.score)
            .bind(new.total_marks)
            .bind(new.percentage)
            .bind(new.time_taken_seconds)
            .bind(Json(&new.review_data))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some("assignment_submissions_attempt_key") {
                    StoreError::Conflict("Attempt has already been submitted".to_string())
                } else {
                    StoreError::from(e)
                }
            })?;
        Ok(Submission::from(row))
    }

    async fn count_submissions(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<i64, StoreError> {
        let sql = "SELECT COUNT(*) FROM assignment_submissions \
             WHERE assignment_id = $1 AND student_id = $2 AND status = 'submitted'";
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .bind(assignment_id)
            .bind(student_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        let sql = format!("SELECT {SUBMISSION_COLS} FROM assignment_submissions WHERE id = $1");
        let row = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Submission::from))
    }

    async fn upsert_result(
        &self,
        assignment_id: i64,
        student_id: i64,
        score: i32,
        percentage: f64,
        passed: bool,
    ) -> Result<AssignmentResult, StoreError> {
        let sql = format!(
            "INSERT INTO assignment_results (assignment_id, student_id, best_score, \
             best_percentage, attempts_used, passed, last_attempt_at) \
             VALUES ($1, $2, $3, $4, 1, $5, now()) \
             ON CONFLICT (assignment_id, student_id) DO UPDATE SET \
                best_score = GREATEST(assignment_results.best_score, EXCLUDED.best_score), \
                best_percentage = GREATEST(assignment_results.best_percentage, EXCLUDED.best_percentage), \
                attempts_used = assignment_results.attempts_used + 1, \
                passed = assignment_results.passed OR EXCLUDED.passed, \
                last_attempt_at = now() \
             RETURNING {RESULT_COLS}"
        );
        Ok(sqlx::query_as::<_, AssignmentResult>(&sql)
            .bind(assignment_id)
            .bind(student_id)
            .bind(score)
            .bind(percentage)
            .bind(passed)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_result(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<AssignmentResult>, StoreError> {
        let sql = format!(
            "SELECT {RESULT_COLS} FROM assignment_results \
             WHERE assignment_id = $1 AND student_id = $2"
        );
        Ok(sqlx::query_as::<_, AssignmentResult>(&sql)
            .bind(assignment_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_part_completed(&self, part_id: i64, student_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO part_progress (part_id, student_id) VALUES ($1, $2) \
             ON CONFLICT (part_id, student_id) DO NOTHING",
        )
        .bind(part_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
