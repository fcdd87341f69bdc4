mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::auth::{auth_header, login_and_get_token, login_and_get_tokens, register_child};
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_auth_register_parent_success() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "parent-reg@test.com",
            "username": "parent_reg",
            "password": "Passw0rd!",
            "userType": "parent",
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["data"]["accessToken"].is_string());
    assert_eq!(body["data"]["user"]["userType"], "parent");
    assert!(body["data"]["user"]["parentId"].is_null());
}

#[tokio::test]
async fn it_auth_register_child_creates_parent_account() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "sam@test.com",
            "username": "sam",
            "password": "Passw0rd!",
            "userType": "child",
            "age": 8,
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["userType"], "child");
    assert_eq!(body["data"]["user"]["age"], 8);
    assert!(body["data"]["user"]["parentId"].is_string());

    // The derived parent account can log in with the derived credentials.
    let parent_login = request(
        &app.app,
        Method::POST,
        "/api/auth/login",
        Some(serde_json::json!({
            "email": "sam+parent@test.com",
            "password": "Passw0rd!@parent",
        })),
        &[],
    )
    .await;

    let (login_status, _, login_body) = response_json(parent_login).await;
    assert_eq!(login_status, StatusCode::OK);
    assert_eq!(login_body["data"]["user"]["username"], "parent_sam");
    assert_eq!(login_body["data"]["user"]["userType"], "parent");

    let parent_token = login_body["data"]["accessToken"].as_str().unwrap();

    // The child shows up under the parent's children listing.
    let children = request(
        &app.app,
        Method::GET,
        "/api/users/children",
        None,
        &[("authorization", auth_header(parent_token))],
    )
    .await;
    let (children_status, _, children_body) = response_json(children).await;
    assert_eq!(children_status, StatusCode::OK);
    assert_eq!(children_body["data"][0]["username"], "sam");
}

#[tokio::test]
async fn it_auth_child_requires_age() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "ageless@test.com",
            "username": "ageless",
            "password": "Passw0rd!",
            "userType": "child",
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "AUTH_AGE_REQUIRED");
}

#[tokio::test]
async fn it_auth_duplicate_email_conflict() {
    let app = spawn_test_server().await;

    for _ in 0..2 {
        let _ = request(
            &app.app,
            Method::POST,
            "/api/auth/register",
            Some(serde_json::json!({
                "email": "dup@test.com",
                "username": "dup",
                "password": "Passw0rd!",
                "userType": "parent",
            })),
            &[],
        )
        .await;
    }

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "dup@test.com",
            "username": "dup2",
            "password": "Passw0rd!",
            "userType": "parent",
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "AUTH_EMAIL_EXISTS");
}

#[tokio::test]
async fn it_auth_weak_password_rejected() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "weak@test.com",
            "username": "weak",
            "password": "short",
            "userType": "parent",
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "AUTH_WEAK_PASSWORD");
}

#[tokio::test]
async fn it_auth_login_wrong_password_is_unauthorized() {
    let app = spawn_test_server().await;

    let _ = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "login@test.com",
            "username": "login",
            "password": "Passw0rd!",
            "userType": "parent",
        })),
        &[],
    )
    .await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/login",
        Some(serde_json::json!({
            "email": "login@test.com",
            "password": "WrongPassw0rd!",
        })),
        &[],
    )
    .await;

    let (status, _, _) = response_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_auth_refresh_rotates_token() {
    let app = spawn_test_server().await;
    let (access_token, refresh_token) = login_and_get_tokens(&app.app).await;

    let refresh = request(
        &app.app,
        Method::POST,
        "/api/auth/refresh",
        None,
        &[("authorization", auth_header(&refresh_token))],
    )
    .await;

    let (status, _, body) = response_json(refresh).await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert_ne!(new_access, access_token);

    let new_me = request(
        &app.app,
        Method::GET,
        "/api/users/me",
        None,
        &[("authorization", auth_header(&new_access))],
    )
    .await;
    let (new_status, _, _) = response_json(new_me).await;
    assert_eq!(new_status, StatusCode::OK);

    // A refresh token is one-time use.
    let refresh_again = request(
        &app.app,
        Method::POST,
        "/api/auth/refresh",
        None,
        &[("authorization", auth_header(&refresh_token))],
    )
    .await;
    let (old_refresh_status, _, _) = response_json(refresh_again).await;
    assert_eq!(old_refresh_status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_auth_logout_revokes_session() {
    let app = spawn_test_server().await;
    let token = login_and_get_token(&app.app).await;

    let logout = request(
        &app.app,
        Method::POST,
        "/api/auth/logout",
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;

    let (status, _, _) = response_json(logout).await;
    assert_eq!(status, StatusCode::OK);

    let me = request(
        &app.app,
        Method::GET,
        "/api/users/me",
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    let (me_status, _, _) = response_json(me).await;
    assert_eq!(me_status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_auth_forgot_password_never_reveals_accounts() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/forgot-password",
        Some(serde_json::json!({"email": "nobody@test.com"})),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emailSent"], true);
}

#[tokio::test]
async fn it_auth_change_password_revokes_and_requires_new() {
    let app = spawn_test_server().await;
    let (child_token, _username) = register_child(&app.app).await;

    let change = request(
        &app.app,
        Method::POST,
        "/api/auth/change-password",
        Some(serde_json::json!({
            "currentPassword": "Passw0rd!",
            "newPassword": "NewPassw0rd!",
        })),
        &[("authorization", auth_header(&child_token))],
    )
    .await;

    let (status, _, _) = response_json(change).await;
    assert_eq!(status, StatusCode::OK);

    // The old access token is gone with the sessions.
    let me = request(
        &app.app,
        Method::GET,
        "/api/users/me",
        None,
        &[("authorization", auth_header(&child_token))],
    )
    .await;
    let (me_status, _, _) = response_json(me).await;
    assert_eq!(me_status, StatusCode::UNAUTHORIZED);
}
