use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::{AuthParent, AuthUser};
use crate::response::{ok, AppError};
use crate::routes::auth::UserProfile;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/children", get(children))
}

async fn me(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store()
        .get_user_by_id(&auth_user.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(ok(UserProfile::from(&user)))
}

async fn children(
    parent: AuthParent,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let children = state.store().list_children(&parent.user_id)?;
    let profiles: Vec<UserProfile> = children.iter().map(UserProfile::from).collect();
    Ok(ok(profiles))
}
