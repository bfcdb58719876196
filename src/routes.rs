// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assignments, auth},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, assignments, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (storage handle + config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<axum::http::HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .finish()
            .expect("invalid rate limiter configuration"),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let assignment_routes = Router::new()
        .route("/{part_id}", get(assignments::get_assignment))
        .route("/{part_id}/start", post(assignments::start_assignment))
        .route(
            "/attempt/{attempt_id}/progress",
            post(assignments::update_progress),
        )
        .route(
            "/attempt/{attempt_id}/auto-save",
            post(assignments::auto_save),
        )
        .route(
            "/attempt/{attempt_id}/submit",
            post(assignments::submit_assignment),
        )
        .route(
            "/submission/{submission_id}/review",
            get(assignments::review_submission),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/assignments", post(admin::create_assignment))
        .route(
            "/assignments/{id}",
            put(admin::update_assignment).delete(admin::delete_assignment),
        )
        .route(
            "/assignments/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        // Double middleware protection: Auth first, then staff check
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/assignments", assignment_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
