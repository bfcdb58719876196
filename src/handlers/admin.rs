// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        assignment::{CreateAssignmentRequest, UpdateAssignmentRequest},
        question::CreateQuestionRequest,
    },
    store::{AssignmentPatch, NewAssignment, NewQuestion, Store},
    utils::{html::clean_html, jwt::Claims},
};

/// Assignments are immutable while a student is inside one; any config or
/// question mutation is rejected until every in-progress attempt ends.
async fn ensure_no_active_attempts(
    store: &Arc<dyn Store>,
    assignment_id: i64,
) -> Result<(), AppError> {
    if store.count_active_attempts(assignment_id).await? > 0 {
        return Err(AppError::Conflict(
            "Assignment has attempts in progress".to_string(),
        ));
    }
    Ok(())
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Creates an assignment for a learning part. Staff only.
pub async fn create_assignment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let assignment = store
        .create_assignment(NewAssignment {
            part_id: payload.part_id,
            title: payload.title,
            description: non_empty(payload.description).map(|d| clean_html(&d)),
            total_marks: 0,
            passing_marks: payload.passing_marks,
            time_limit_minutes: payload.time_limit_minutes,
            max_attempts: payload.max_attempts,
            shuffle_questions: payload.shuffle_questions,
            show_results_immediately: payload.show_results_immediately,
            allow_review: payload.allow_review,
            created_by: Some(claims.user_id()?),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Updates assignment configuration. Staff only.
pub async fn update_assignment(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_no_active_attempts(&store, id).await?;

    let assignment = store
        .update_assignment(
            id,
            AssignmentPatch {
                title: payload.title,
                description: payload.description.map(|d| clean_html(&d)),
                passing_marks: payload.passing_marks,
                time_limit_minutes: payload.time_limit_minutes,
                max_attempts: payload.max_attempts,
                shuffle_questions: payload.shuffle_questions,
                show_results_immediately: payload.show_results_immediately,
                allow_review: payload.allow_review,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok(Json(assignment))
}

/// Deletes an assignment and everything under it. Staff only.
pub async fn delete_assignment(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_no_active_attempts(&store, id).await?;
    store.delete_assignment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists an assignment's questions with answer keys. Staff only.
pub async fn list_questions(
    State(store): State<Arc<dyn Store>>,
    Path(assignment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    store
        .find_assignment(assignment_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    let questions = store.list_questions(assignment_id).await?;
    Ok(Json(questions))
}

fn question_fields(
    assignment_id: i64,
    payload: CreateQuestionRequest,
) -> Result<NewQuestion, AppError> {
    let correct_answers = payload.answer_key().map_err(AppError::BadRequest)?;
    Ok(NewQuestion {
        assignment_id,
        question_text: clean_html(&payload.question_text),
        question_type: payload.question_type,
        option_a: payload.option_a,
        option_b: payload.option_b,
        option_c: non_empty(payload.option_c),
        option_d: non_empty(payload.option_d),
        option_e: non_empty(payload.option_e),
        correct_answers,
        marks: payload.marks,
        explanation: non_empty(payload.explanation).map(|e| clean_html(&e)),
        question_order: payload.question_order.unwrap_or(0),
    })
}

/// Adds a question to an assignment. Staff only.
pub async fn create_question(
    State(store): State<Arc<dyn Store>>,
    Path(assignment_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    store
        .find_assignment(assignment_id)
        .await?
        .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    ensure_no_active_attempts(&store, assignment_id).await?;

    let question = store
        .create_question(question_fields(assignment_id, payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question. Staff only.
pub async fn update_question(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = store
        .find_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    ensure_no_active_attempts(&store, existing.assignment_id).await?;

    let question = store
        .update_question(id, question_fields(existing.assignment_id, payload)?)
        .await?;

    Ok(Json(question))
}

/// Deletes a question. Staff only.
pub async fn delete_question(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = store
        .find_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    ensure_no_active_attempts(&store, existing.assignment_id).await?;
    store.delete_question(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
