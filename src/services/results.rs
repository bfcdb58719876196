// src/services/results.rs

use std::sync::Arc;

use crate::models::assignment::Assignment;
use crate::models::result::AssignmentResult;
use crate::store::{Store, StoreError};

/// Maintains the per-(student, assignment) rollup across submissions.
pub struct ResultsAggregator {
    store: Arc<dyn Store>,
}

impl ResultsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Folds one scored submission into the student's result row.
    ///
    /// The store upsert is atomic per pair: best score and percentage only
    /// ever grow, attempts_used counts submissions exactly, and once
    /// passed the row stays passed. On a passing submission the learning
    /// part is marked completed; that notification is fire-and-forget and
    /// never fails the submission itself.
    pub async fn record(
        &self,
        assignment: &Assignment,
        student_id: i64,
        score: i32,
        percentage: f64,
    ) -> Result<AssignmentResult, StoreError> {
        let passed = percentage >= f64::from(assignment.passing_marks);

        let result = self
            .store
            .upsert_result(assignment.id, student_id, score, percentage, passed)
            .await?;

        if passed {
            if let Err(err) = self
                .store
                .mark_part_completed(assignment.part_id, student_id)
                .await
            {
                tracing::warn!(
                    "Failed to mark part {} completed for student {}: {:?}",
                    assignment.part_id,
                    student_id,
                    err
                );
            }
        }

        Ok(result)
    }
}
