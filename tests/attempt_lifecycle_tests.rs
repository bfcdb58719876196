// tests/attempt_lifecycle_tests.rs

mod common;

use common::{
    AssignmentSpec, answers_body, login, register_and_login, seed_assignment, seed_question,
    seed_teacher, spawn_app,
};
use lms_backend::models::question::QuestionType;

#[tokio::test]
async fn resume_replays_the_shuffled_order() {
    let app = spawn_app().await;
    let assignment = seed_assignment(
        &app,
        AssignmentSpec {
            shuffle_questions: true,
            ..AssignmentSpec::default()
        },
    )
    .await;
    for _ in 0..10 {
        seed_question(&app, &assignment, QuestionType::Single, "A", 1).await;
    }

    let token = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", token);

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
    assert_eq!(start["resumed"], false);
    let first_order: Vec<i64> = start["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();
    assert_eq!(first_order.len(), 10);

    // A second start call resumes the open attempt with the same order.
    let resume: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Resume failed")
        .json()
        .await
        .unwrap();
    assert_eq!(resume["resumed"], true);
    assert_eq!(resume["attempt"]["attempt_number"], 1);
    let second_order: Vec<i64> = resume["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();
    assert_eq!(second_order, first_order);
}

#[tokio::test]
async fn progress_updates_shrink_but_never_grow() {
    let app = spawn_app().await;
    seed_assignment(&app, AssignmentSpec::default()).await;

    let token = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", token);

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

    let progress_url = format!(
        "{}/api/assignments/attempt/{}/progress",
        app.address, attempt_id
    );

    let shrink: serde_json::Value = app
        .client
        .post(&progress_url)
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "time_remaining_seconds": 120 }))
        .send()
        .await
        .expect("Progress failed")
        .json()
        .await
        .unwrap();
    assert_eq!(shrink["time_remaining_seconds"], 120);

    // A later heartbeat claiming more time is clamped to the stored value.
    let grow: serde_json::Value = app
        .client
        .post(&progress_url)
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "time_remaining_seconds": 400 }))
        .send()
        .await
        .expect("Progress failed")
        .json()
        .await
        .unwrap();
    assert_eq!(grow["time_remaining_seconds"], 120);
}

#[tokio::test]
async fn auto_save_finalizes_on_expiry_and_scores_reported_answers() {
    let app = spawn_app().await;
    let assignment = seed_assignment(&app, AssignmentSpec::default()).await;
    let q = seed_question(&app, &assignment, QuestionType::Single, "A", 5).await;

    let token = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", token);

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

    let auto_save_url = format!(
        "{}/api/assignments/attempt/{}/auto-save",
        app.address, attempt_id
    );

    // Time still on the clock: plain checkpoint.
    let alive: serde_json::Value = app
        .client
        .post(&auto_save_url)
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "time_remaining_seconds": 60 }))
        .send()
        .await
        .expect("Auto-save failed")
        .json()
        .await
        .unwrap();
    assert_eq!(alive["timed_out"], false);

    // Clock reported as expired: the server finalizes with the answers
    // carried by this very request.
    let mut body = answers_body(&[(q.id, serde_json::json!("A"))]);
    body["time_remaining_seconds"] = serde_json::json!(0);
    let expired: serde_json::Value = app
        .client
        .post(&auto_save_url)
        .header("Authorization", &auth)
        .json(&body)
        .send()
        .await
        .expect("Auto-save failed")
        .json()
        .await
        .unwrap();
    assert_eq!(expired["timed_out"], true);
    assert_eq!(expired["score"], 5);
    assert_eq!(expired["percentage"], 100.0);

    // The attempt is terminal now; an explicit submit is too late.
    let submit = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&answers_body(&[]))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit.status().as_u16(), 409);

    // But the timed-out submission counted, and a fresh attempt gets the
    // next number.
    let next: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/1/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();
    assert_eq!(next["attempt"]["attempt_number"], 2);
    assert_eq!(next["resumed"], false);
}

#[tokio::test]
async fn review_is_gated_by_ownership_and_config() {
    let app = spawn_app().await;

    // Part 1 allows review, part 2 does not.
    let open = seed_assignment(&app, AssignmentSpec::default()).await;
    let q_open = seed_question(&app, &open, QuestionType::Single, "A", 5).await;
    let closed = seed_assignment(
        &app,
        AssignmentSpec {
            part_id: 2,
            allow_review: false,
            ..AssignmentSpec::default()
        },
    )
    .await;
    seed_question(&app, &closed, QuestionType::Single, "A", 5).await;

    let owner = register_and_login(&app, "password123").await;
    let stranger = register_and_login(&app, "password123").await;
    let auth = format!("Bearer {}", owner);

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

    let submit: serde_json::Value = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&answers_body(&[(q_open.id, serde_json::json!("B"))]))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();
    let submission_id = submit["submission_id"].as_i64().unwrap();

    let review_url = format!(
        "{}/api/assignments/submission/{}/review",
        app.address, submission_id
    );

    // Owner sees the full detail, answer keys included.
    let review = app
        .client
        .get(&review_url)
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Review failed");
    assert_eq!(review.status().as_u16(), 200);
    let review: serde_json::Value = review.json().await.unwrap();
    assert_eq!(review["questions"][0]["correct_answers"][0], "A");
    assert_eq!(review["submission"]["review_data"][0]["correct"], false);

    // Someone else's token is rejected.
    let foreign = app
        .client
        .get(&review_url)
        .header("Authorization", format!("Bearer {}", stranger))
        .send()
        .await
        .expect("Review failed");
    assert_eq!(foreign.status().as_u16(), 403);

    // With allow_review off, even the owner is refused.
    let start: serde_json::Value = app
        .client
        .post(format!("{}/api/assignments/2/start", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();
    let submit: serde_json::Value = app
        .client
        .post(format!(
            "{}/api/assignments/attempt/{}/submit",
            app.address, attempt_id
        ))
        .header("Authorization", &auth)
        .json(&answers_body(&[]))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();
    assert!(submit["review_data"].is_null());
    let submission_id = submit["submission_id"].as_i64().unwrap();

    let refused = app
        .client
        .get(format!(
            "{}/api/assignments/submission/{}/review",
            app.address, submission_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .expect("Review failed");
    assert_eq!(refused.status().as_u16(), 403);
}

#[tokio::test]
async fn staff_manage_assignments_students_do_not() {
    let app = spawn_app().await;
    seed_teacher(&app, "teacher_a", "password123").await;
    let teacher = login(&app, "teacher_a", "password123").await;
    let student = register_and_login(&app, "password123").await;

    // Teacher builds an assignment over HTTP.
    let created = app
        .client
        .post(format!("{}/api/admin/assignments", app.address))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({
            "part_id": 9,
            "title": "Fractions quiz",
            "passing_marks": 50,
            "time_limit_minutes": 15,
            "max_attempts": 2
        }))
        .send()
        .await
        .expect("Create assignment failed");
    assert_eq!(created.status().as_u16(), 201);
    let created: serde_json::Value = created.json().await.unwrap();
    let assignment_id = created["id"].as_i64().unwrap();

    let question = app
        .client
        .post(format!(
            "{}/api/admin/assignments/{}/questions",
            app.address, assignment_id
        ))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({
            "question_text": "1/2 + 1/4 = ?",
            "question_type": "single",
            "option_a": "3/4",
            "option_b": "2/6",
            "correct_answers": "A",
            "marks": 5
        }))
        .send()
        .await
        .expect("Create question failed");
    assert_eq!(question.status().as_u16(), 201);

    // A broken answer key is rejected up front.
    let invalid = app
        .client
        .post(format!(
            "{}/api/admin/assignments/{}/questions",
            app.address, assignment_id
        ))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({
            "question_text": "Broken",
            "question_type": "single",
            "option_a": "Yes",
            "option_b": "No",
            "correct_answers": "D",
            "marks": 5
        }))
        .send()
        .await
        .expect("Create question failed");
    assert_eq!(invalid.status().as_u16(), 400);

    // Students cannot reach the admin surface at all.
    let forbidden = app
        .client
        .post(format!("{}/api/admin/assignments", app.address))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "part_id": 10,
            "title": "Nope",
            "passing_marks": 50,
            "time_limit_minutes": 15
        }))
        .send()
        .await
        .expect("Create assignment failed");
    assert_eq!(forbidden.status().as_u16(), 403);

    // Once a student is inside the assignment, its config is frozen.
    let start = app
        .client
        .post(format!("{}/api/assignments/9/start", app.address))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(start.status().as_u16(), 200);

    let frozen = app
        .client
        .put(format!(
            "{}/api/admin/assignments/{}",
            app.address, assignment_id
        ))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "time_limit_minutes": 1 }))
        .send()
        .await
        .expect("Update failed");
    assert_eq!(frozen.status().as_u16(), 409);
}
