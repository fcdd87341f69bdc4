mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::auth::{auth_header, register_child};
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_game_score_is_normalized_and_evaluated() {
    let app = spawn_test_server().await;
    let (token, _) = register_child(&app.app).await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/games/scores",
        Some(serde_json::json!({
            "gameType": "word-match",
            "score": 45.0,
            "maxScore": 50.0,
            "level": 2,
            "timeTakenSecs": 90.0,
        })),
        &[("authorization", auth_header(&token))],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);

    let score = &body["data"]["score"];
    assert_eq!(score["gameType"], "word-match");
    assert!((score["score"].as_f64().unwrap() - 0.9).abs() < 1e-9);
    assert_eq!(score["rawScore"].as_f64().unwrap(), 45.0);
    assert_eq!(score["level"], 2);

    let evaluation = &body["data"]["evaluation"];
    assert_eq!(evaluation["adjustment"], "increase");
}

#[tokio::test]
async fn it_game_score_rejects_bad_max_score() {
    let app = spawn_test_server().await;
    let (token, _) = register_child(&app.app).await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/games/scores",
        Some(serde_json::json!({
            "gameType": "word-match",
            "score": 10.0,
            "maxScore": 0.0,
        })),
        &[("authorization", auth_header(&token))],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "GAME_INVALID_MAX_SCORE");
}

#[tokio::test]
async fn it_game_score_overshoot_clamps_to_one() {
    let app = spawn_test_server().await;
    let (token, _) = register_child(&app.app).await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/games/scores",
        Some(serde_json::json!({
            "gameType": "bonus-round",
            "score": 120.0,
            "maxScore": 100.0,
        })),
        &[("authorization", auth_header(&token))],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["score"]["score"].as_f64().unwrap(), 1.0);
}

#[tokio::test]
async fn it_game_scores_require_auth() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/games/scores",
        Some(serde_json::json!({
            "gameType": "word-match",
            "score": 10.0,
            "maxScore": 20.0,
        })),
        &[],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
