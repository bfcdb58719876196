// src/handlers/assignments.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        assignment::Assignment,
        attempt::{
            Attempt, AttemptStatus, AutoSaveRequest, ProgressRequest, ProgressResponse,
            StartAssignmentResponse,
        },
        question::PublicQuestion,
        submission::{ResultsSummary, SubmitRequest, SubmitResponse},
    },
    services::{attempts::AttemptManager, gate::AttemptGate, results::ResultsAggregator},
    store::{Store, StoreError},
    utils::jwt::Claims,
};

/// Loads an attempt and checks it belongs to the calling student, along
/// with its assignment.
async fn load_owned_attempt(
    store: &Arc<dyn Store>,
    attempt_id: i64,
    student_id: i64,
) -> Result<(Attempt, Assignment), AppError> {
    let attempt = store
        .find_attempt(attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != student_id {
        return Err(AppError::Forbidden(
            "Attempt belongs to another student".to_string(),
        ));
    }

    let assignment = store
        .find_assignment(attempt.assignment_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    Ok((attempt, assignment))
}

/// Assignment overview for a student: config, current eligibility and the
/// rolled-up result so far.
pub async fn get_assignment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(part_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let assignment = store
        .find_assignment_by_part(part_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    let gate = AttemptGate::new(store.clone());
    let eligibility = gate.evaluate(&assignment, student_id).await?;
    let result = store.find_result(assignment.id, student_id).await?;

    Ok(Json(json!({
        "assignment": assignment,
        "eligibility": eligibility,
        "result": result,
    })))
}

/// Starts (or resumes) an attempt at the assignment backing a learning part.
///
/// The policy gate runs on every call; a denial is returned as structured
/// JSON with a 403, not as an opaque error. Questions are sent without
/// answer keys or explanations, and a resume replays the question order
/// persisted at start.
pub async fn start_assignment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(part_id): Path<i64>,
) -> Result<Response, AppError> {
    let student_id = claims.user_id()?;

    let assignment = store
        .find_assignment_by_part(part_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    let gate = AttemptGate::new(store.clone());
    let eligibility = gate.evaluate(&assignment, student_id).await?;
    if !eligibility.can_attempt {
        return Ok((StatusCode::FORBIDDEN, Json(eligibility)).into_response());
    }

    let manager = AttemptManager::new(store.clone());

    let (attempt, questions, resumed) = match store
        .find_active_attempt(assignment.id, student_id)
        .await?
    {
        Some(active) => {
            let questions = manager.attempt_questions(&active).await?;
            (active, questions, true)
        }
        None => match manager.start(&assignment, student_id).await {
            Ok((attempt, questions)) => (attempt, questions, false),
            // A concurrent start from another tab won the race; resume
            // the attempt it created instead of failing.
            Err(StoreError::Conflict(_)) => {
                let active = store
                    .find_active_attempt(assignment.id, student_id)
                    .await?
                    .ok_or(AppError::Conflict(
                        "Could not start the attempt".to_string(),
                    ))?;
                let questions = manager.attempt_questions(&active).await?;
                (active, questions, true)
            }
            Err(e) => return Err(e.into()),
        },
    };

    let time_limit_seconds = assignment.time_limit_seconds();
    let response = StartAssignmentResponse {
        total_questions: questions.len(),
        questions: questions.iter().map(PublicQuestion::from).collect(),
        assignment,
        attempt,
        time_limit_seconds,
        resumed,
    };

    Ok(Json(response).into_response())
}

/// Records a time-remaining heartbeat. Advisory only: it never triggers
/// scoring, and the stored clock can only go down.
pub async fn update_progress(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<ProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let (attempt, assignment) = load_owned_attempt(&store, attempt_id, student_id).await?;

    if attempt.status.is_terminal() {
        return Err(AppError::Conflict(
            "Attempt is already finalized".to_string(),
        ));
    }

    let manager = AttemptManager::new(store);
    let effective = manager
        .heartbeat(&assignment, &attempt, req.time_remaining_seconds)
        .await?;

    Ok(Json(ProgressResponse {
        time_remaining_seconds: effective,
    }))
}

/// Auto-save checkpoint. When the clock has run out the server finalizes
/// the attempt right here, scoring the answers carried by this request
/// (or zero if none), and tells the client via `timed_out: true`.
pub async fn auto_save(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<AutoSaveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let (attempt, assignment) = load_owned_attempt(&store, attempt_id, student_id).await?;

    if attempt.status.is_terminal() {
        // A previous checkpoint or submit already closed it.
        return Ok(Json(json!({ "timed_out": true })));
    }

    let manager = AttemptManager::new(store.clone());
    let server = AttemptManager::server_remaining(&assignment, &attempt, Utc::now());
    let effective = req
        .time_remaining_seconds
        .min(server)
        .min(attempt.time_remaining_seconds)
        .max(0);

    if effective > 0 {
        store.update_attempt_time(attempt.id, effective).await?;
        return Ok(Json(json!({
            "timed_out": false,
            "time_remaining_seconds": effective,
        })));
    }

    let aggregator = ResultsAggregator::new(store.clone());
    let answers = req.answers.unwrap_or_default();
    match manager
        .finalize(
            &assignment,
            &attempt,
            answers,
            AttemptStatus::TimedOut,
            &aggregator,
        )
        .await
    {
        Ok(finalized) => Ok(Json(json!({
            "timed_out": true,
            "submission_id": finalized.submission.id,
            "score": finalized.submission.score,
            "total_marks": finalized.submission.total_marks,
            "percentage": finalized.submission.percentage,
        }))),
        // Another request finalized it first; the outcome is the same.
        Err(StoreError::Conflict(_)) => Ok(Json(json!({ "timed_out": true }))),
        Err(e) => Err(e.into()),
    }
}

/// Submits an attempt and returns the scored result.
///
/// A submit that arrives after the server clock expired is still scored
/// (same policy as the auto-save path) but recorded as timed out.
pub async fn submit_assignment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let (attempt, assignment) = load_owned_attempt(&store, attempt_id, student_id).await?;

    if attempt.status.is_terminal() {
        return Err(AppError::Conflict(
            "Attempt has already been submitted".to_string(),
        ));
    }

    let status = if AttemptManager::server_remaining(&assignment, &attempt, Utc::now()) <= 0 {
        AttemptStatus::TimedOut
    } else {
        AttemptStatus::Completed
    };

    let manager = AttemptManager::new(store.clone());
    let aggregator = ResultsAggregator::new(store.clone());
    let finalized = manager
        .finalize(&assignment, &attempt, req.answers, status, &aggregator)
        .await?;

    let passed = finalized.submission.percentage >= f64::from(assignment.passing_marks);
    let review_data = if assignment.show_results_immediately && assignment.allow_review {
        finalized.submission.review_data.clone()
    } else {
        None
    };

    Ok(Json(SubmitResponse {
        submission_id: finalized.submission.id,
        score: finalized.submission.score,
        total_marks: finalized.submission.total_marks,
        percentage: finalized.submission.percentage,
        passed,
        time_taken_seconds: finalized.submission.time_taken_seconds,
        review_data,
        results_summary: ResultsSummary {
            best_score: finalized.result.best_score,
            best_percentage: finalized.result.best_percentage,
            attempts_used: finalized.result.attempts_used,
            max_attempts: assignment.max_attempts,
            passed: finalized.result.passed,
        },
    }))
}

/// Review of a past submission: the stored per-question detail plus the
/// questions with their answer keys. Only for the owning student (or
/// staff), and only when the assignment allows review.
pub async fn review_submission(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let submission = store
        .find_submission(submission_id)
        .await?
        .ok_or(AppError::NotFound("Submission not found".to_string()))?;

    if submission.student_id != user_id && !claims.is_staff() {
        return Err(AppError::Forbidden(
            "Submission belongs to another student".to_string(),
        ));
    }

    let assignment = store
        .find_assignment(submission.assignment_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    if !assignment.allow_review {
        return Err(AppError::Forbidden(
            "Review is not permitted for this assignment".to_string(),
        ));
    }

    // Questions in the order they were reviewed, i.e. the attempt's order.
    let mut by_id: std::collections::HashMap<i64, _> = store
        .list_questions(assignment.id)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();
    let questions: Vec<_> = submission
        .review_data
        .iter()
        .flatten()
        .filter_map(|entry| by_id.remove(&entry.question_id))
        .collect();

    Ok(Json(json!({
        "submission": submission,
        "assignment": assignment,
        "questions": questions,
    })))
}
