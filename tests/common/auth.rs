use axum::http::{HeaderMap, Method};
use axum::Router;

use super::http::{request, response_json};

pub async fn login_and_get_token(app: &Router) -> String {
    let (access, _refresh) = login_and_get_tokens(app).await;
    access
}

/// Extracts a named cookie value from Set-Cookie headers.
pub fn extract_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all("set-cookie") {
        if let Ok(s) = value.to_str() {
            if let Some(rest) = s.strip_prefix(&format!("{cookie_name}=")) {
                let val = rest.split(';').next().unwrap_or("");
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}

/// Registers a fresh parent account. Returns (access_token, refresh_token);
/// the refresh token comes from the Set-Cookie header.
pub async fn login_and_get_tokens(app: &Router) -> (String, String) {
    let email = format!("user-{}@test.com", uuid::Uuid::new_v4());
    let username = format!("user-{}", uuid::Uuid::new_v4().simple());

    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": email,
            "username": username,
            "password": "Passw0rd!",
            "userType": "parent",
        })),
        &[],
    )
    .await;

    let (status, headers, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");

    let access = body["data"]["accessToken"]
        .as_str()
        .expect("access token in register response")
        .to_string();

    let refresh = extract_cookie_value(&headers, "refresh_token")
        .expect("refresh_token cookie in register response");

    (access, refresh)
}

/// Registers a fresh child account (which auto-creates its parent).
/// Returns (access_token, child_username).
pub async fn register_child(app: &Router) -> (String, String) {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let email = format!("child-{suffix}@test.com");
    let username = format!("child-{suffix}");

    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": email,
            "username": username,
            "password": "Passw0rd!",
            "userType": "child",
            "age": 8,
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "child register failed: {body}");

    let access = body["data"]["accessToken"]
        .as_str()
        .expect("access token in register response")
        .to_string();

    (access, username)
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}
