// tests/common/mod.rs

// Each integration test binary pulls in the subset of helpers it needs.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use lms_backend::config::Config;
use lms_backend::models::assignment::Assignment;
use lms_backend::models::question::{Question, QuestionType, parse_answer_key};
use lms_backend::state::AppState;
use lms_backend::store::{MemStore, NewAssignment, NewQuestion, NewUser, Store};
use lms_backend::utils::hash::hash_password;

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemStore>,
    pub client: reqwest::Client,
}

/// Spawns the full router on a random port over the in-memory store, so
/// the tests need no running database.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemStore::new());
    let shared: Arc<dyn Store> = store.clone();

    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        store: shared,
        config,
    };

    let app = lms_backend::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

/// Registers a fresh student over HTTP and returns a bearer token.
pub async fn register_and_login(app: &TestApp, password: &str) -> String {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    login(app, &username, password).await
}

pub async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let response = app
        .client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    response["token"]
        .as_str()
        .expect("Token not found")
        .to_string()
}

/// Creates a teacher account directly in the store; log in over HTTP.
pub async fn seed_teacher(app: &TestApp, username: &str, password: &str) {
    app.store
        .create_user(NewUser {
            username: username.to_string(),
            password: hash_password(password).unwrap(),
            role: "teacher".to_string(),
        })
        .await
        .unwrap();
}

pub struct AssignmentSpec {
    pub part_id: i64,
    pub passing_marks: i32,
    pub time_limit_minutes: i32,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub allow_review: bool,
}

impl Default for AssignmentSpec {
    fn default() -> Self {
        Self {
            part_id: 1,
            passing_marks: 50,
            time_limit_minutes: 10,
            max_attempts: 3,
            shuffle_questions: false,
            allow_review: true,
        }
    }
}

/// Seeds an assignment directly in the store.
pub async fn seed_assignment(app: &TestApp, spec: AssignmentSpec) -> Assignment {
    app.store
        .create_assignment(NewAssignment {
            part_id: spec.part_id,
            title: "Chapter quiz".to_string(),
            description: None,
            total_marks: 0,
            passing_marks: spec.passing_marks,
            time_limit_minutes: spec.time_limit_minutes,
            max_attempts: spec.max_attempts,
            shuffle_questions: spec.shuffle_questions,
            show_results_immediately: true,
            allow_review: spec.allow_review,
            created_by: None,
        })
        .await
        .unwrap()
}

/// Builds a `{"answers": {...}}` submit body keyed by question id.
pub fn answers_body(entries: &[(i64, serde_json::Value)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(id, value)| (id.to_string(), value.clone()))
        .collect();
    serde_json::json!({ "answers": map })
}

/// Seeds a question directly in the store.
pub async fn seed_question(
    app: &TestApp,
    assignment: &Assignment,
    question_type: QuestionType,
    key: &str,
    marks: i32,
) -> Question {
    app.store
        .create_question(NewQuestion {
            assignment_id: assignment.id,
            question_text: "What holds?".to_string(),
            question_type,
            option_a: "First".to_string(),
            option_b: "Second".to_string(),
            option_c: Some("Third".to_string()),
            option_d: None,
            option_e: None,
            correct_answers: parse_answer_key(key).unwrap(),
            marks,
            explanation: Some("See chapter 2".to_string()),
            question_order: 0,
        })
        .await
        .unwrap()
}
