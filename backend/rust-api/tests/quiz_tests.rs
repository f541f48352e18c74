use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{create_test_app, get, post_json, signup, unique_email};
use quizthon_api::middlewares::auth::JwtService;

fn result_body(category: &str, difficulty: &str, score: u32, percentage: u32) -> serde_json::Value {
    json!({
        "category": category,
        "difficulty": difficulty,
        "score": score,
        "totalQuestions": 10,
        "percentage": percentage,
    })
}

#[tokio::test]
async fn test_save_result_success() {
    let app = create_test_app();
    let token = signup(&app, "Player", &unique_email("save"), "secret123").await;

    let (status, json) = post_json(
        &app,
        "/api/quiz/save-result",
        result_body("General Knowledge", "easy", 7, 70),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Quiz result saved successfully!");
    let saved = &json["quizResult"];
    assert!(saved["id"].is_string());
    assert_eq!(saved["category"], "General Knowledge");
    assert_eq!(saved["difficulty"], "easy");
    assert_eq!(saved["score"], 7);
    assert_eq!(saved["totalQuestions"], 10);
    assert_eq!(saved["percentage"], 70);
    assert!(saved["date"].is_string());
    assert!(saved["timestamp"].is_i64());
}

#[tokio::test]
async fn test_history_most_recent_first() {
    let app = create_test_app();
    let token = signup(&app, "Historian", &unique_email("history"), "secret123").await;

    for (category, score) in [("History", 4), ("Geography", 9)] {
        let (status, _) = post_json(
            &app,
            "/api/quiz/save-result",
            result_body(category, "medium", score, score * 10),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = get(&app, "/api/quiz/history", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["category"], "Geography");
    assert_eq!(history[1]["category"], "History");

    // The profile carries the same history.
    let (_, profile) = get(&app, "/api/auth/profile", Some(&token)).await;
    assert_eq!(profile["user"]["quizHistory"][0]["category"], "Geography");
}

#[tokio::test]
async fn test_history_empty_for_new_user() {
    let app = create_test_app();
    let token = signup(&app, "Newcomer", &unique_email("empty"), "secret123").await;

    let (status, json) = get(&app, "/api/quiz/history", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["history"], json!([]));
}

#[tokio::test]
async fn test_history_is_per_user() {
    let app = create_test_app();
    let alice = signup(&app, "Alice", &unique_email("alice"), "secret123").await;
    let bob = signup(&app, "Bob", &unique_email("bob"), "secret123").await;

    post_json(
        &app,
        "/api/quiz/save-result",
        result_body("Art", "hard", 3, 30),
        Some(&alice),
    )
    .await;

    let (_, json) = get(&app, "/api/quiz/history", Some(&bob)).await;
    assert_eq!(json["history"], json!([]));
}

#[tokio::test]
async fn test_save_result_rejects_score_above_total() {
    let app = create_test_app();
    let token = signup(&app, "Cheater", &unique_email("cheat"), "secret123").await;

    let (status, json) = post_json(
        &app,
        "/api/quiz/save-result",
        result_body("Sports", "easy", 11, 100),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation");
}

#[tokio::test]
async fn test_save_result_rejects_unknown_difficulty() {
    let app = create_test_app();
    let token = signup(&app, "Player", &unique_email("difficulty"), "secret123").await;

    let (status, _) = post_json(
        &app,
        "/api/quiz/save-result",
        result_body("Sports", "extreme", 5, 50),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_save_result_requires_token() {
    let app = create_test_app();

    let (status, json) = post_json(
        &app,
        "/api/quiz/save-result",
        result_body("Sports", "easy", 5, 50),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "missing_token");
}

#[tokio::test]
async fn test_history_for_deleted_user() {
    let app = create_test_app();
    let token = JwtService::new("test-secret", 7)
        .issue("no-such-user", "gone@example.com")
        .unwrap();

    let (status, json) = get(&app, "/api/quiz/history", Some(&token)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "user_not_found");
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let (status, json) = get(&app, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "quizthon-api");
    assert_eq!(json["dependencies"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_requires_basic_auth() {
    let app = create_test_app();

    let (status, _) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = general_purpose::STANDARD.encode("admin:wrong");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", wrong))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_exposes_counters() {
    let app = create_test_app();
    let token = signup(&app, "Counted", &unique_email("metrics"), "secret123").await;
    post_json(
        &app,
        "/api/quiz/save-result",
        result_body("Animals", "easy", 8, 80),
        Some(&token),
    )
    .await;

    let credentials = general_purpose::STANDARD.encode("admin:changeme");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("quiz_results_saved_total"));
    assert!(text.contains("users_registered_total"));
}
