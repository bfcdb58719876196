// tests/assignment_api_tests.rs

mod common;

use common::{
    AssignmentSpec, answers_body, register_and_login, seed_assignment, seed_question, spawn_app,
};
use lms_backend::models::question::QuestionType;

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn starting_requires_authentication() {
    let app = spawn_app().await;
    seed_assignment(&app, AssignmentSpec::default()).await;

    let response = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn starting_a_missing_assignment_is_404() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "password123").await;

    let response = app
        .client
        .post(format!("{}/api/assignments/999/start", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn full_attempt_flow_keeps_the_best_result() {
    let app = spawn_app().await;
    let assignment = seed_assignment(&app, AssignmentSpec::default()).await;
    let q1 = seed_question(&app, &assignment, QuestionType::Single, "A", 5).await;
    let q2 = seed_question(&app, &assignment, QuestionType::Multiple, "A,C", 5).await;

    let token = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", token);

    // 1. Start the first attempt. The payload must never carry answer keys.
    let start = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Start failed");
    assert_eq!(start.status().as_u16(), 200);
    let body = start.text().await.unwrap();
    assert!(!body.contains("correct_answers"));
    assert!(!body.contains("explanation"));
    let start: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(start["attempt"]["attempt_number"], 1);
    assert_eq!(start["total_questions"], 2);
    assert_eq!(start["time_limit_seconds"], 600);
    assert_eq!(start["resumed"], false);
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    // 2. Perfect submission.
    let submit = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&answers_body(&[
            (q1.id, serde_json::json!("A")),
            (q2.id, serde_json::json!(["A", "C"])),
        ]))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit.status().as_u16(), 200);
    let result: serde_json::Value = submit.json().await.unwrap();
    assert_eq!(result["score"], 10);
    assert_eq!(result["total_marks"], 10);
    assert_eq!(result["percentage"], 100.0);
    assert_eq!(result["passed"], true);
    assert!(result["review_data"].is_array());
    assert_eq!(result["results_summary"]["attempts_used"], 1);

    // 3. Resubmitting the same attempt is rejected.
    let again = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .expect("Resubmit failed");
    assert_eq!(again.status().as_u16(), 409);

    // 4. Second attempt, this time a complete miss: the rollup keeps the
    // best percentage and the sticky pass.
    let start: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();
    assert_eq!(start["attempt"]["attempt_number"], 2);
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    let result: serde_json::Value = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&answers_body(&[
            (q1.id, serde_json::json!("B")),
            (q2.id, serde_json::json!(["A"])),
        ]))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 0);
    assert_eq!(result["percentage"], 0.0);
    assert_eq!(result["passed"], false);
    assert_eq!(result["results_summary"]["best_percentage"], 100.0);
    assert_eq!(result["results_summary"]["attempts_used"], 2);
    assert_eq!(result["results_summary"]["passed"], true);

    // 5. Overview reflects the rollup.
    let overview: serde_json::Value = app
        .client
        .get(format!("{}/api/assignments/1", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Overview failed")
        .json()
        .await
        .unwrap();
    assert_eq!(overview["result"]["best_score"], 10);
    assert_eq!(overview["result"]["passed"], true);
    assert_eq!(overview["eligibility"]["next_attempt"], 3);
}

#[tokio::test]
async fn gate_denies_after_max_attempts_even_with_zero_scores() {
    let app = spawn_app().await;
    let assignment = seed_assignment(
        &app,
        AssignmentSpec {
            max_attempts: 2,
            ..AssignmentSpec::default()
        },
    )
    .await;
    seed_question(&app, &assignment, QuestionType::Single, "A", 5).await;

    let token = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", token);

    for _ in 0..2 {
        let start: serde_json::Value = app
            .client
            .post(format!("{}/api/assignments/1/start", app.address))
            .header("Authorization", &auth)
            .send()
            .await
            .expect("Start failed")
            .json()
            .await
            .unwrap();
        let attempt_id = start["attempt"]["id"].as_i64().unwrap();

        // Zero-score submissions still consume attempts.
        let submit = app
            .client
            .post(format!(
                "{}/api/assignments/attempt/{}/submit",
                app.address, attempt_id
            ))
            .header("Authorization", &auth)
            .json(&serde_json::json!({ "answers": {} }))
            .send()
            .await
            .expect("Submit failed");
        assert_eq!(submit.status().as_u16(), 200);
    }

    let denied = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Start failed");
    assert_eq!(denied.status().as_u16(), 403);
    let body: serde_json::Value = denied.json().await.unwrap();
    assert_eq!(body["can_attempt"], false);
    assert_eq!(body["reason"], "Maximum attempts reached");
    assert_eq!(body["attempts_used"], 2);
    assert_eq!(body["max_attempts"], 2);
}

#[tokio::test]
async fn attempts_are_isolated_per_student() {
    let app = spawn_app().await;
    let assignment = seed_assignment(&app, AssignmentSpec::default()).await;
    let q = seed_question(&app, &assignment, QuestionType::Single, "A", 5).await;

    let first = register_and_login(&app, "password123").await;
    let second = register_and_login(&app, "password123").await;

    let start: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", format!("Bearer {}", first))
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    // The second student cannot touch the first student's attempt.
    let submit = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", format!("Bearer {}", second))
        .json(&answers_body(&[(q.id, serde_json::json!("A"))]))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit.status().as_u16(), 403);

    // And their own attempt numbering starts at 1.
    let start: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", format!("Bearer {}", second))
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();
    assert_eq!(start["attempt"]["attempt_number"], 1);
}
