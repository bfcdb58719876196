// src/services/gate.rs

use std::sync::Arc;

use serde::Serialize;

use crate::models::assignment::Assignment;
use crate::store::{Store, StoreError};

/// Outcome of the attempt policy check. "Cannot attempt" is an expected
/// answer, not an error, so this is returned as data rather than thrown.
#[derive(Debug, Serialize)]
pub struct AttemptEligibility {
    pub can_attempt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub has_active_attempt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt: Option<i32>,
    pub attempts_used: i64,
    pub max_attempts: i32,
}

/// Decides whether a student may start (or resume) an attempt.
pub struct AttemptGate {
    store: Arc<dyn Store>,
}

impl AttemptGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Evaluates the policy for one (student, assignment) pair.
    ///
    /// Must be re-run on every start request: concurrent tabs or devices
    /// can change the answer between calls, so the result is never cached.
    /// The max-attempts check counts submissions rather than attempt rows,
    /// so an attempt left dangling by a crash after its submission was
    /// written still counts against the limit.
    pub async fn evaluate(
        &self,
        assignment: &Assignment,
        student_id: i64,
    ) -> Result<AttemptEligibility, StoreError> {
        if !assignment.is_active {
            return Ok(AttemptEligibility {
                can_attempt: false,
                reason: Some("Assignment not found".to_string()),
                has_active_attempt: false,
                attempt_id: None,
                attempt_number: None,
                next_attempt: None,
                attempts_used: 0,
                max_attempts: assignment.max_attempts,
            });
        }

        let attempts_used = self
            .store
            .count_submissions(assignment.id, student_id)
            .await?;

        if attempts_used >= i64::from(assignment.max_attempts) {
            return Ok(AttemptEligibility {
                can_attempt: false,
                reason: Some("Maximum attempts reached".to_string()),
                has_active_attempt: false,
                attempt_id: None,
                attempt_number: None,
                next_attempt: None,
                attempts_used,
                max_attempts: assignment.max_attempts,
            });
        }

        if let Some(active) = self
            .store
            .find_active_attempt(assignment.id, student_id)
            .await?
        {
            return Ok(AttemptEligibility {
                can_attempt: true,
                reason: None,
                has_active_attempt: true,
                attempt_id: Some(active.id),
                attempt_number: Some(active.attempt_number),
                next_attempt: None,
                attempts_used,
                max_attempts: assignment.max_attempts,
            });
        }

        Ok(AttemptEligibility {
            can_attempt: true,
            reason: None,
            has_active_attempt: false,
            attempt_id: None,
            attempt_number: None,
            next_attempt: Some(attempts_used as i32 + 1),
            attempts_used,
            max_attempts: assignment.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use crate::store::MemStore;

    #[tokio::test]
    async fn allows_first_attempt() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let assignment = fixtures::assignment(&store, 50, 3, false).await;

        let gate = AttemptGate::new(store);
        let eligibility = gate.evaluate(&assignment, 42).await.unwrap();

        assert!(eligibility.can_attempt);
        assert!(!eligibility.has_active_attempt);
        assert_eq!(eligibility.next_attempt, Some(1));
        assert_eq!(eligibility.attempts_used, 0);
    }

    #[tokio::test]
    async fn denies_inactive_assignment() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let mut assignment = fixtures::assignment(&store, 50, 3, false).await;
        assignment.is_active = false;

        let gate = AttemptGate::new(store);
        let eligibility = gate.evaluate(&assignment, 42).await.unwrap();

        assert!(!eligibility.can_attempt);
        assert_eq!(eligibility.reason.as_deref(), Some("Assignment not found"));
    }

    #[tokio::test]
    async fn denies_when_max_attempts_reached_even_with_zero_scores() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let assignment = fixtures::assignment(&store, 50, 2, false).await;

        // Two submissions, the latest a complete miss.
        fixtures::submission(&store, &assignment, 42, 1, 60.0).await;
        fixtures::submission(&store, &assignment, 42, 2, 0.0).await;

        let gate = AttemptGate::new(store);
        let eligibility = gate.evaluate(&assignment, 42).await.unwrap();

        assert!(!eligibility.can_attempt);
        assert_eq!(
            eligibility.reason.as_deref(),
            Some("Maximum attempts reached")
        );
        assert_eq!(eligibility.attempts_used, 2);
        assert_eq!(eligibility.max_attempts, 2);
    }

    #[tokio::test]
    async fn resumes_active_attempt_instead_of_starting_new() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let assignment = fixtures::assignment(&store, 50, 3, false).await;
        let attempt = fixtures::attempt(&store, &assignment, 42).await;

        let gate = AttemptGate::new(store);
        let eligibility = gate.evaluate(&assignment, 42).await.unwrap();

        assert!(eligibility.can_attempt);
        assert!(eligibility.has_active_attempt);
        assert_eq!(eligibility.attempt_id, Some(attempt.id));
        assert_eq!(eligibility.attempt_number, Some(1));
    }

    #[tokio::test]
    async fn counts_submissions_not_attempts_for_the_limit() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let assignment = fixtures::assignment(&store, 50, 2, false).await;

        // One submission plus a dangling in-progress attempt: the limit
        // check must see one attempt used, not two.
        fixtures::submission(&store, &assignment, 42, 1, 30.0).await;
        fixtures::attempt(&store, &assignment, 42).await;

        let gate = AttemptGate::new(store);
        let eligibility = gate.evaluate(&assignment, 42).await.unwrap();

        assert!(eligibility.can_attempt);
        assert!(eligibility.has_active_attempt);
        assert_eq!(eligibility.attempts_used, 1);
    }
}
