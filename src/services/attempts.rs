// src/services/attempts.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::models::assignment::Assignment;
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::question::Question;
use crate::models::result::AssignmentResult;
use crate::models::submission::{AnswerMap, Submission};
use crate::services::results::ResultsAggregator;
use crate::services::scoring;
use crate::store::{NewAttempt, NewSubmission, Store, StoreError};

/// Everything produced by ending an attempt.
#[derive(Debug)]
pub struct FinalizedAttempt {
    pub submission: Submission,
    pub result: AssignmentResult,
}

/// Owns the attempt lifecycle: start, resume, heartbeats and the
/// terminal transition.
pub struct AttemptManager {
    store: Arc<dyn Store>,
}

impl AttemptManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Starts a fresh attempt. Call only after the gate has approved one.
    ///
    /// The attempt number is allocated inside the store, atomically per
    /// (student, assignment); a client-supplied number is never trusted.
    /// When the assignment shuffles questions, the shuffled id order is
    /// persisted on the attempt so a resume replays it instead of
    /// re-rolling on every page load.
    pub async fn start(
        &self,
        assignment: &Assignment,
        student_id: i64,
    ) -> Result<(Attempt, Vec<Question>), StoreError> {
        let mut questions = self.store.list_questions(assignment.id).await?;
        if assignment.shuffle_questions {
            questions.shuffle(&mut rand::thread_rng());
        }
        let question_order: Vec<i64> = questions.iter().map(|q| q.id).collect();

        let attempt = self
            .store
            .create_attempt(NewAttempt {
                assignment_id: assignment.id,
                student_id,
                time_remaining_seconds: assignment.time_limit_seconds(),
                question_order,
            })
            .await?;

        Ok((attempt, questions))
    }

    /// The attempt's question set, replayed in the order served at start.
    /// Questions added to the assignment afterwards are not part of it.
    pub async fn attempt_questions(&self, attempt: &Attempt) -> Result<Vec<Question>, StoreError> {
        let questions = self.store.list_questions(attempt.assignment_id).await?;
        let mut by_id: HashMap<i64, Question> =
            questions.into_iter().map(|q| (q.id, q)).collect();
        Ok(attempt
            .question_order
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    /// Remaining seconds according to the server clock alone.
    pub fn server_remaining(
        assignment: &Assignment,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> i32 {
        let elapsed = (now - attempt.start_time)
            .num_seconds()
            .clamp(0, i64::from(i32::MAX)) as i32;
        assignment.time_limit_seconds().saturating_sub(elapsed)
    }

    /// Records a client heartbeat and returns the effective remaining
    /// time. The client value is advisory: the stored value can only
    /// shrink, and never exceeds what the server clock allows.
    pub async fn heartbeat(
        &self,
        assignment: &Assignment,
        attempt: &Attempt,
        client_remaining: i32,
    ) -> Result<i32, StoreError> {
        let server = Self::server_remaining(assignment, attempt, Utc::now());
        let effective = client_remaining
            .min(server)
            .min(attempt.time_remaining_seconds)
            .max(0);
        self.store.update_attempt_time(attempt.id, effective).await?;
        Ok(effective)
    }

    /// Ends an attempt: scores the answers, writes the one submission,
    /// folds it into the result rollup, then moves the attempt to its
    /// terminal state — in that order, so a crash mid-way leaves a
    /// submission the gate still counts against the limit.
    ///
    /// Timeouts take the same path as submits and score whatever answers
    /// were last reported; an empty map scores zero.
    pub async fn finalize(
        &self,
        assignment: &Assignment,
        attempt: &Attempt,
        answers: AnswerMap,
        status: AttemptStatus,
        aggregator: &ResultsAggregator,
    ) -> Result<FinalizedAttempt, StoreError> {
        if attempt.status.is_terminal() {
            return Err(StoreError::Conflict(
                "Attempt is already finalized".to_string(),
            ));
        }

        let questions = self.attempt_questions(attempt).await?;
        let breakdown = scoring::calculate_score(&questions, &answers);

        let now = Utc::now();
        let time_taken_seconds = (now - attempt.start_time)
            .num_seconds()
            .clamp(0, i64::from(assignment.time_limit_seconds()))
            as i32;

        let submission = self
            .store
            .create_submission(NewSubmission {
                assignment_id: assignment.id,
                student_id: attempt.student_id,
                attempt_number: attempt.attempt_number,
                answers,
                score: breakdown.score,
                total_marks: breakdown.total_marks,
                percentage: breakdown.percentage,
                time_taken_seconds,
                review_data: breakdown.review_data,
            })
            .await?;

        let result = aggregator
            .record(
                assignment,
                attempt.student_id,
                submission.score,
                submission.percentage,
            )
            .await?;

        self.store
            .complete_attempt(attempt.id, status, now)
            .await?;

        Ok(FinalizedAttempt { submission, result })
    }
}
