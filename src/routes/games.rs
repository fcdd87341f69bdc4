use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;

use crate::extractors::JsonBody;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::engine::Evaluation;
use crate::response::{created, AppError};
use crate::state::AppState;
use crate::store::operations::game_scores::GameScore;

pub fn router() -> Router<AppState> {
    Router::new().route("/scores", post(submit_score))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScoreRequest {
    pub game_type: String,
    pub score: f64,
    pub max_score: f64,
    pub level: Option<u32>,
    pub time_taken_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScoreResponse {
    pub score: GameScore,
    pub evaluation: Option<Evaluation>,
}

async fn submit_score(
    auth_user: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GameScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    let game_type = req.game_type.trim();
    if game_type.is_empty() || game_type.len() > 64 {
        return Err(AppError::bad_request(
            "GAME_INVALID_TYPE",
            "gameType must be between 1 and 64 characters",
        ));
    }
    if !(req.max_score.is_finite() && req.max_score > 0.0) {
        return Err(AppError::bad_request(
            "GAME_INVALID_MAX_SCORE",
            "maxScore must be a positive number",
        ));
    }
    if !(req.score.is_finite() && req.score >= 0.0) {
        return Err(AppError::bad_request(
            "GAME_INVALID_SCORE",
            "score must be a non-negative number",
        ));
    }
    if let Some(t) = req.time_taken_secs {
        if !(t.is_finite() && t >= 0.0) {
            return Err(AppError::bad_request(
                "GAME_INVALID_TIME",
                "timeTakenSecs must be a non-negative number",
            ));
        }
    }

    let normalized = (req.score / req.max_score).clamp(0.0, 1.0);

    let score = GameScore {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: auth_user.user_id.clone(),
        game_type: game_type.to_string(),
        score: normalized,
        raw_score: req.score,
        max_score: req.max_score,
        level: req.level.unwrap_or(1),
        time_taken_secs: req.time_taken_secs,
        created_at: Utc::now(),
    };

    state.store().save_game_score(&score)?;

    if let Err(e) = state.store().record_daily_activity(
        &score.user_id,
        Utc::now().date_naive(),
        req.time_taken_secs.unwrap_or(0.0),
    ) {
        tracing::warn!(user_id = %score.user_id, error = %e, "Failed to record daily activity");
    }

    let evaluation = match state
        .engine()
        .process_score(&score.user_id, normalized)
        .await
    {
        Ok(evaluation) => Some(evaluation),
        Err(e) => {
            tracing::error!(user_id = %score.user_id, error = %e, "Difficulty evaluation failed");
            None
        }
    };

    Ok(created(GameScoreResponse { score, evaluation }))
}
