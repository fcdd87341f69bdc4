use axum::extract::State;
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use crate::extractors::JsonBody;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{
    extract_refresh_token_from_headers, generate_dummy_argon2_hash, hash_password, hash_token,
    sign_jwt_for_user, sign_refresh_token_for_user, verify_jwt, verify_password, AuthUser,
};
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::password_resets::PasswordResetToken;
use crate::store::operations::sessions::Session;
use crate::store::operations::users::{User, UserType};
use crate::store::StoreError;
use crate::validation::{is_valid_email, validate_child_age, validate_password, validate_username};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub user_type: UserType,
    pub age: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub user_type: UserType,
    pub parent_id: Option<String>,
    pub age: Option<u32>,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            email: value.email.clone(),
            username: value.username.clone(),
            user_type: value.user_type,
            parent_id: value.parent_id.clone(),
            age: value.age,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// Per-user concurrent session cap.
const MAX_SESSIONS_PER_USER: usize = 10;

const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Issue an access + refresh token pair and persist both sessions.
fn issue_token_pair(user_id: &str, state: &AppState) -> Result<(String, String), AppError> {
    if let Err(e) = state
        .store()
        .cleanup_oldest_user_sessions(user_id, MAX_SESSIONS_PER_USER)
    {
        tracing::warn!(user_id, error = %e, "Failed to trim excess sessions");
    }

    let access_token = sign_jwt_for_user(
        user_id,
        &state.config().jwt_secret,
        state.config().jwt_expires_in_hours,
    )?;

    let refresh_token = sign_refresh_token_for_user(
        user_id,
        &state.config().refresh_jwt_secret,
        state.config().refresh_token_expires_in_hours,
    )?;

    let token_hash = hash_token(&access_token);
    state.store().create_session(&Session {
        token_hash,
        user_id: user_id.to_string(),
        token_type: "user".to_string(),
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::hours(state.config().jwt_expires_in_hours as i64),
        revoked: false,
    })?;

    let refresh_hash = hash_token(&refresh_token);
    state.store().create_session(&Session {
        token_hash: refresh_hash,
        user_id: user_id.to_string(),
        token_type: "refresh".to_string(),
        created_at: Utc::now(),
        expires_at: Utc::now()
            + Duration::hours(state.config().refresh_token_expires_in_hours as i64),
        revoked: false,
    })?;

    Ok((access_token, refresh_token))
}

/// Derived credentials for the auto-created parent account:
/// `parent_<username>` / `<password>@parent` / `<local>+parent@<domain>`.
/// The suffix variant is used when the derived identity collides.
fn derive_parent_identity(
    child_username: &str,
    child_email: &str,
    suffix: Option<i64>,
) -> Option<(String, String)> {
    let (local, domain) = child_email.split_once('@')?;
    match suffix {
        None => Some((
            format!("parent_{child_username}"),
            format!("{local}+parent@{domain}"),
        )),
        Some(ts) => Some((
            format!("parent_{child_username}_{ts}"),
            format!("{local}+parent{ts}@{domain}"),
        )),
    }
}

/// A child registration brings its parent account into existence. Returns
/// the parent user id.
fn create_parent_for_child(
    state: &AppState,
    child_username: &str,
    child_email: &str,
    child_password: &str,
) -> Result<String, AppError> {
    let parent_password_hash = hash_password(&format!("{child_password}@parent"))?;

    for suffix in [None, Some(Utc::now().timestamp())] {
        let Some((parent_username, parent_email)) =
            derive_parent_identity(child_username, child_email, suffix)
        else {
            return Err(AppError::bad_request(
                "AUTH_INVALID_EMAIL",
                "Invalid email format",
            ));
        };

        let now = Utc::now();
        let parent = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: parent_email,
            username: parent_username,
            password_hash: parent_password_hash.clone(),
            user_type: UserType::Parent,
            parent_id: None,
            age: None,
            created_at: now,
            updated_at: now,
        };

        match state.store().create_user(&parent) {
            Ok(()) => return Ok(parent.id),
            Err(StoreError::Conflict { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::conflict(
        "AUTH_PARENT_EXISTS",
        "Could not allocate a parent account for this child",
    ))
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request(
            "AUTH_INVALID_EMAIL",
            "Invalid email format",
        ));
    }
    let username = req.username.trim();
    if let Err(msg) = validate_username(username) {
        return Err(AppError::bad_request("AUTH_INVALID_USERNAME", msg));
    }
    if let Err(msg) = validate_password(&req.password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    let age = match req.user_type {
        UserType::Child => {
            let age = req.age.ok_or_else(|| {
                AppError::bad_request("AUTH_AGE_REQUIRED", "Child accounts require an age")
            })?;
            if let Err(msg) = validate_child_age(age) {
                return Err(AppError::bad_request("AUTH_INVALID_AGE", msg));
            }
            Some(age)
        }
        UserType::Parent => None,
    };

    if state.store().get_user_by_email(&email)?.is_some() {
        return Err(AppError::conflict(
            "AUTH_EMAIL_EXISTS",
            "Email already registered",
        ));
    }
    if state.store().get_user_by_username(username)?.is_some() {
        return Err(AppError::conflict(
            "AUTH_USERNAME_EXISTS",
            "Username already taken",
        ));
    }

    let parent_id = match req.user_type {
        UserType::Child => Some(create_parent_for_child(
            &state,
            username,
            &email,
            &req.password,
        )?),
        UserType::Parent => None,
    };

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.clone(),
        username: username.to_string(),
        password_hash: hash_password(&req.password)?,
        user_type: req.user_type,
        parent_id,
        age,
        created_at: now,
        updated_at: now,
    };

    state.store().create_user(&user)?;

    let (access_token, refresh_token) = issue_token_pair(&user.id, &state)?;

    let payload = AuthResponse {
        access_token: access_token.clone(),
        user: UserProfile::from(&user),
    };

    let mut response = created(payload).into_response();
    set_token_cookie(&mut response, &access_token)?;
    set_refresh_token_cookie(&mut response, &refresh_token)?;
    Ok(response)
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state.store().get_user_by_email(&req.email)?;

    // Always run a verification so missing accounts take as long as wrong
    // passwords.
    let hash = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(generate_dummy_argon2_hash);
    let verified = verify_password(&req.password, &hash)?;

    let Some(user) = user else {
        return Err(AppError::unauthorized("Invalid email or password"));
    };
    if !verified {
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let (access_token, refresh_token) = issue_token_pair(&user.id, &state)?;

    let payload = AuthResponse {
        access_token: access_token.clone(),
        user: UserProfile::from(&user),
    };

    let mut response = ok(payload).into_response();
    set_token_cookie(&mut response, &access_token)?;
    set_refresh_token_cookie(&mut response, &refresh_token)?;
    Ok(response)
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let old_token = extract_refresh_token_from_headers(&headers)?;

    let claims = verify_jwt(&old_token, &state.config().refresh_jwt_secret)?;
    if claims.token_type != "refresh" {
        return Err(AppError::unauthorized(
            "Invalid token type: expected refresh token",
        ));
    }

    let old_hash = hash_token(&old_token);
    let session = state
        .store()
        .get_session(&old_hash)?
        .ok_or_else(|| AppError::unauthorized("Refresh session not found or expired"))?;

    if session.user_id != claims.sub {
        return Err(AppError::unauthorized("Refresh session mismatch"));
    }

    // One-time use: the atomic delete loses the race for a replayed token.
    let was_deleted = state.store().delete_session_if_exists(&old_hash)?;
    if !was_deleted {
        return Err(AppError::unauthorized("Refresh token already consumed"));
    }

    let user = state
        .store()
        .get_user_by_id(&claims.sub)?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let (access_token, refresh_token) = issue_token_pair(&claims.sub, &state)?;

    let mut response = ok(AuthResponse {
        access_token: access_token.clone(),
        user: UserProfile::from(&user),
    })
    .into_response();
    set_token_cookie(&mut response, &access_token)?;
    set_refresh_token_cookie(&mut response, &refresh_token)?;
    Ok(response)
}

async fn logout(auth_user: AuthUser, State(state): State<AppState>) -> Result<Response, AppError> {
    state.store().delete_user_sessions(&auth_user.user_id)?;

    let mut response = ok(serde_json::json!({"loggedOut": true})).into_response();
    clear_auth_cookies(&mut response)?;
    Ok(response)
}

async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(user) = state.store().get_user_by_email(&req.email)? {
        let raw_token = uuid::Uuid::new_v4().simple().to_string();
        let token_hash = hash_token(&raw_token);

        state
            .store()
            .create_password_reset_token(&PasswordResetToken {
                token_hash,
                user_id: user.id.clone(),
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS),
                used: false,
            })?;

        // The token only ever leaves through logs, never the response.
        tracing::trace!(
            token_prefix = %&raw_token[..8],
            "Password reset token generated (dev diagnostics only)"
        );

        tracing::info!(
            email = %mask_email_for_log(&user.email),
            "Password reset requested; email delivery not configured"
        );
    }

    Ok(ok(serde_json::json!({
        "emailSent": true,
        "message": "If the email exists, a password reset link will be sent.",
    })))
}

async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(msg) = validate_password(&req.new_password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    let token_hash = hash_token(&req.token);

    let entry = state
        .store()
        .get_valid_password_reset_token(&token_hash)?
        .ok_or_else(|| {
            AppError::bad_request("AUTH_INVALID_RESET_TOKEN", "Invalid or expired reset token")
        })?;

    // Consuming is atomic, so a token can never reset two passwords.
    if !state.store().consume_password_reset_token(&token_hash)? {
        return Err(AppError::bad_request(
            "AUTH_INVALID_RESET_TOKEN",
            "Invalid or expired reset token",
        ));
    }

    let mut user = state
        .store()
        .get_user_by_id(&entry.user_id)?
        .ok_or_else(|| AppError::bad_request("AUTH_INVALID_RESET_TOKEN", "Invalid reset token"))?;

    user.password_hash = hash_password(&req.new_password)?;
    user.updated_at = Utc::now();
    state.store().update_user(&user)?;

    let _ = state.store().delete_user_sessions(&user.id);

    Ok(ok(serde_json::json!({"passwordReset": true})))
}

async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(msg) = validate_password(&req.new_password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    let mut user = state
        .store()
        .get_user_by_id(&auth_user.user_id)?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    user.password_hash = hash_password(&req.new_password)?;
    user.updated_at = Utc::now();
    state.store().update_user(&user)?;

    // All sessions are revoked; the client must log in again.
    state.store().delete_user_sessions(&user.id)?;

    let mut response = ok(serde_json::json!({"passwordChanged": true})).into_response();
    clear_auth_cookies(&mut response)?;
    Ok(response)
}

fn set_token_cookie(response: &mut Response, token: &str) -> Result<(), AppError> {
    let cookie = format!("token={token}; Path=/; SameSite=Strict; HttpOnly; Secure");
    append_set_cookie(response, &cookie, "token cookie set failed")?;
    Ok(())
}

fn set_refresh_token_cookie(response: &mut Response, refresh_token: &str) -> Result<(), AppError> {
    let cookie =
        format!("refresh_token={refresh_token}; Path=/; SameSite=Strict; HttpOnly; Secure");
    append_set_cookie(response, &cookie, "refresh token cookie set failed")?;
    Ok(())
}

fn clear_auth_cookies(response: &mut Response) -> Result<(), AppError> {
    append_set_cookie(
        response,
        "token=; Path=/; Max-Age=0; SameSite=Strict; HttpOnly; Secure",
        "token cookie clear failed",
    )?;
    append_set_cookie(
        response,
        "refresh_token=; Path=/; Max-Age=0; SameSite=Strict; HttpOnly; Secure",
        "refresh token cookie clear failed",
    )?;
    Ok(())
}

fn append_set_cookie(
    response: &mut Response,
    cookie: &str,
    error_context: &str,
) -> Result<(), AppError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::internal(&format!("{error_context}: {e}")))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

fn mask_email_for_log(email: &str) -> String {
    let trimmed = email.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return "***".to_string();
    };

    let local_mask = local
        .chars()
        .next()
        .map(|ch| format!("{ch}***"))
        .unwrap_or_else(|| "***".to_string());
    let domain_mask = domain
        .chars()
        .next()
        .map(|ch| format!("{ch}***"))
        .unwrap_or_else(|| "***".to_string());

    format!("{local_mask}@{domain_mask}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_email_for_log_redacts_sensitive_parts() {
        assert_eq!(mask_email_for_log("alice@example.com"), "a***@e***");
        assert_eq!(mask_email_for_log("x@b.com"), "x***@b***");
        assert_eq!(mask_email_for_log("invalid-email"), "***");
    }

    #[test]
    fn parent_identity_derives_from_child() {
        let (username, email) = derive_parent_identity("sam", "sam@example.com", None).unwrap();
        assert_eq!(username, "parent_sam");
        assert_eq!(email, "sam+parent@example.com");
    }

    #[test]
    fn parent_identity_suffix_variant() {
        let (username, email) =
            derive_parent_identity("sam", "sam@example.com", Some(1756000000)).unwrap();
        assert_eq!(username, "parent_sam_1756000000");
        assert_eq!(email, "sam+parent1756000000@example.com");
    }
}
