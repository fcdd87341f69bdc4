use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::engine::classifier::TrendClassifier;
use crate::engine::config::EngineConfig;
use crate::engine::state::{LearnerDifficultyState, PerformanceSample};
use crate::engine::strategy::{
    Adjustment, ClassifierStrategy, DifficultyStrategy, RuleBasedStrategy,
};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid score: {0}")]
    InvalidScore(f64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub adjustment: Adjustment,
    pub previous_difficulty: f64,
    pub new_difficulty: f64,
    pub trend: f64,
    pub consecutive_low_scores: u32,
    pub classifier_active: bool,
    pub strategy: &'static str,
}

/// Adaptive difficulty engine. One instance serves the whole process; the
/// classifier (when enabled) is shared across learners while each learner's
/// state is evaluated under a per-user lock.
pub struct DifficultyEngine {
    config: EngineConfig,
    store: Arc<Store>,
    classifier: Option<Arc<TrendClassifier>>,
    strategy: Box<dyn DifficultyStrategy>,
    user_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DifficultyEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<Store>,
        classifier_enabled: bool,
        model_path: &Path,
    ) -> Result<Self, String> {
        config.validate()?;

        let classifier = if classifier_enabled {
            Some(Arc::new(TrendClassifier::load_or_seed(model_path)))
        } else {
            None
        };

        let strategy: Box<dyn DifficultyStrategy> = match &classifier {
            Some(clf) => Box::new(ClassifierStrategy::new(clf.clone(), &config)),
            None => Box::new(RuleBasedStrategy::from_config(&config)),
        };

        Ok(Self {
            config,
            store,
            classifier,
            strategy,
            user_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier_active(&self) -> bool {
        self.classifier.is_some()
    }

    async fn acquire_user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;

        // Periodically prune entries no longer held by anyone.
        // Arc::strong_count == 1 means only the HashMap holds a reference,
        // so the lock is idle and can be safely removed.
        if locks.len() > 1000 {
            locks.retain(|_, v| Arc::strong_count(v) > 1);
        }

        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// One evaluation step: trend, streak, adjustment decision, clamped
    /// difficulty update, history append. Pure over the given state.
    pub fn evaluate(
        &self,
        state: &mut LearnerDifficultyState,
        score: f64,
    ) -> Result<Evaluation, EngineError> {
        if !score.is_finite() {
            return Err(EngineError::InvalidScore(score));
        }
        let score = score.clamp(0.0, 1.0);

        let reference = state
            .recent_mean_score(self.config.trend_window)
            .unwrap_or(self.config.neutral_baseline);
        let trend = score - reference;

        if score < self.config.low_score_threshold {
            state.consecutive_low_scores += 1;
        } else {
            state.consecutive_low_scores = 0;
        }

        let adjustment =
            self.strategy
                .predict_adjustment(score, trend, state.consecutive_low_scores);

        let previous_difficulty = state.current_difficulty;
        let new_difficulty = match adjustment {
            Adjustment::Increase => {
                let step = if score > self.config.large_increase_threshold {
                    self.config.step_large
                } else if score > self.config.high_score_threshold {
                    self.config.step_medium
                } else {
                    self.config.step_small
                };
                (previous_difficulty + step).min(self.config.max_difficulty)
            }
            Adjustment::Decrease => {
                let step = if score < self.config.large_decrease_threshold {
                    self.config.step_large
                } else if score < self.config.low_score_threshold {
                    self.config.step_medium
                } else {
                    self.config.step_small
                };
                (previous_difficulty - step).max(self.config.min_difficulty)
            }
            Adjustment::Hold => previous_difficulty,
        };
        state.current_difficulty = new_difficulty;

        state.push_sample(
            PerformanceSample {
                timestamp: chrono::Utc::now(),
                score,
                difficulty: new_difficulty,
            },
            self.config.history_cap,
        );

        Ok(Evaluation {
            adjustment,
            previous_difficulty,
            new_difficulty,
            trend,
            consecutive_low_scores: state.consecutive_low_scores,
            classifier_active: self.classifier.is_some(),
            strategy: self.strategy.name(),
        })
    }

    /// Loads the learner's state, evaluates the score under the per-user
    /// lock, persists, and feeds the classifier's retrain loop.
    pub async fn process_score(
        &self,
        user_id: &str,
        score: f64,
    ) -> Result<Evaluation, EngineError> {
        let user_lock = self.acquire_user_lock(user_id).await;
        let _guard = user_lock.lock().await;

        let mut state = self
            .store
            .get_difficulty_state(user_id)?
            .unwrap_or_else(|| LearnerDifficultyState::new(self.config.initial_difficulty));

        let evaluation = self.evaluate(&mut state, score)?;
        self.store.put_difficulty_state(user_id, &state)?;

        if let Some(classifier) = &self.classifier {
            classifier.observe(&state.performance_history, &self.config);
        }

        tracing::debug!(
            user_id,
            score,
            adjustment = ?evaluation.adjustment,
            difficulty = evaluation.new_difficulty,
            "Difficulty evaluated"
        );

        Ok(evaluation)
    }

    pub fn learner_state(&self, user_id: &str) -> Result<LearnerDifficultyState, EngineError> {
        Ok(self
            .store
            .get_difficulty_state(user_id)?
            .unwrap_or_else(|| LearnerDifficultyState::new(self.config.initial_difficulty)))
    }

    pub fn current_difficulty(&self, user_id: &str) -> Result<f64, EngineError> {
        Ok(self.learner_state(user_id)?.current_difficulty)
    }
}
