use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use chrono::Utc;
use serde::Serialize;

use crate::auth::{AuthParent, AuthUser};
use crate::response::{ok, AppError};
use crate::routes::auth::UserProfile;
use crate::services::risk::{self, RiskScreening};
use crate::state::AppState;
use crate::store::operations::game_scores::GameScore;
use crate::store::operations::test_results::{TestResult, TestType};
use crate::store::operations::users::User;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/highest", get(highest))
        .route("/difficulty", get(difficulty))
        .route("/risk", get(risk_screening))
        .route("/dashboard", get(parent_dashboard))
        .route("/dashboard/:child_id", get(child_dashboard))
}

const RECENT_RESULTS_LIMIT: usize = 20;
const RECENT_GAMES_LIMIT: usize = 20;
const SCREENING_RESULTS_LIMIT: usize = 50;
const DASHBOARD_RECENT_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub recent_test_results: Vec<TestResult>,
    pub recent_game_scores: Vec<GameScore>,
    pub total_tests: usize,
    pub total_learning_time_secs: f64,
    pub activity_streak_days: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestScores {
    pub speech: Option<f64>,
    pub listening: Option<f64>,
    pub games: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyView {
    pub current_difficulty: f64,
    pub consecutive_low_scores: u32,
    pub history_len: usize,
    pub classifier_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDashboard {
    pub child: UserProfile,
    pub highest: HighestScores,
    pub recent_test_results: Vec<TestResult>,
    pub recent_game_scores: Vec<GameScore>,
    pub current_difficulty: f64,
    pub total_learning_time_secs: f64,
    pub activity_streak_days: u32,
    pub risk: Option<RiskScreening>,
}

async fn overview(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = &auth_user.user_id;
    let overview = ProgressOverview {
        recent_test_results: state.store().list_test_results(user_id, RECENT_RESULTS_LIMIT)?,
        recent_game_scores: state.store().list_game_scores(user_id, RECENT_GAMES_LIMIT)?,
        total_tests: state.store().count_test_results(user_id)?,
        total_learning_time_secs: state.store().total_learning_time_secs(user_id)?,
        activity_streak_days: state
            .store()
            .activity_streak_days(user_id, Utc::now().date_naive())?,
    };
    Ok(ok(overview))
}

async fn highest(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(highest_for(&state, &auth_user.user_id)?))
}

async fn difficulty(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let learner = state.engine().learner_state(&auth_user.user_id)?;
    Ok(ok(DifficultyView {
        current_difficulty: learner.current_difficulty,
        consecutive_low_scores: learner.consecutive_low_scores,
        history_len: learner.performance_history.len(),
        classifier_active: state.engine().classifier_active(),
    }))
}

async fn risk_screening(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let results = state
        .store()
        .list_test_results(&auth_user.user_id, SCREENING_RESULTS_LIMIT)?;

    match risk::screen(&results) {
        Some(screening) => Ok(ok(serde_json::json!({
            "conclusive": true,
            "screening": screening,
        }))),
        None => Ok(ok(serde_json::json!({
            "conclusive": false,
            "message": "Not enough test results for a screening yet",
        }))),
    }
}

async fn parent_dashboard(
    parent: AuthParent,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let children = state.store().list_children(&parent.user_id)?;

    let mut dashboards = Vec::with_capacity(children.len());
    for child in &children {
        dashboards.push(dashboard_for(&state, child)?);
    }

    Ok(ok(dashboards))
}

async fn child_dashboard(
    parent: AuthParent,
    State(state): State<AppState>,
    Path(child_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let child = state
        .store()
        .get_user_by_id(&child_id)?
        .ok_or_else(|| AppError::not_found("Child not found"))?;

    // Parents only see their own children.
    if child.parent_id.as_deref() != Some(parent.user_id.as_str()) {
        return Err(AppError::forbidden("Not a child of this parent"));
    }

    Ok(ok(dashboard_for(&state, &child)?))
}

fn highest_for(state: &AppState, user_id: &str) -> Result<HighestScores, AppError> {
    Ok(HighestScores {
        speech: state.store().highest_test_score(user_id, TestType::Speech)?,
        listening: state
            .store()
            .highest_test_score(user_id, TestType::Listening)?,
        games: state.store().highest_game_scores(user_id)?,
    })
}

fn dashboard_for(state: &AppState, child: &User) -> Result<ChildDashboard, AppError> {
    let user_id = &child.id;
    let results = state
        .store()
        .list_test_results(user_id, SCREENING_RESULTS_LIMIT)?;

    Ok(ChildDashboard {
        child: UserProfile::from(child),
        highest: highest_for(state, user_id)?,
        recent_test_results: results.iter().take(DASHBOARD_RECENT_LIMIT).cloned().collect(),
        recent_game_scores: state.store().list_game_scores(user_id, DASHBOARD_RECENT_LIMIT)?,
        current_difficulty: state.engine().current_difficulty(user_id)?,
        total_learning_time_secs: state.store().total_learning_time_secs(user_id)?,
        activity_streak_days: state
            .store()
            .activity_streak_days(user_id, Utc::now().date_naive())?,
        risk: risk::screen(&results),
    })
}
