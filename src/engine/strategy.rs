use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::classifier::TrendClassifier;
use crate::engine::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Increase,
    Decrease,
    Hold,
}

/// Decides the direction of the next difficulty change. Implementations are
/// interchangeable; the step size and clamping live in the engine.
pub trait DifficultyStrategy: Send + Sync {
    fn predict_adjustment(&self, score: f64, trend: f64, consecutive_low: u32) -> Adjustment;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct RuleBasedStrategy {
    low_score_threshold: f64,
    high_score_threshold: f64,
    forced_decrease_streak: u32,
}

impl RuleBasedStrategy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            low_score_threshold: config.low_score_threshold,
            high_score_threshold: config.high_score_threshold,
            forced_decrease_streak: config.forced_decrease_streak,
        }
    }
}

impl DifficultyStrategy for RuleBasedStrategy {
    fn predict_adjustment(&self, score: f64, _trend: f64, consecutive_low: u32) -> Adjustment {
        if consecutive_low >= self.forced_decrease_streak {
            return Adjustment::Decrease;
        }
        if score > self.high_score_threshold {
            Adjustment::Increase
        } else if score < self.low_score_threshold {
            Adjustment::Decrease
        } else {
            Adjustment::Hold
        }
    }

    fn name(&self) -> &'static str {
        "rule_based"
    }
}

/// Gated classifier strategy. The model only ever confirms what the score
/// band already suggests; it cannot push difficulty against the score. Any
/// model failure silently falls back to the rule decision for that call.
pub struct ClassifierStrategy {
    classifier: Arc<TrendClassifier>,
    fallback: RuleBasedStrategy,
    low_score_threshold: f64,
    high_score_threshold: f64,
    forced_decrease_streak: u32,
    probability_gate: f64,
}

impl ClassifierStrategy {
    pub fn new(classifier: Arc<TrendClassifier>, config: &EngineConfig) -> Self {
        Self {
            classifier,
            fallback: RuleBasedStrategy::from_config(config),
            low_score_threshold: config.low_score_threshold,
            high_score_threshold: config.high_score_threshold,
            forced_decrease_streak: config.forced_decrease_streak,
            probability_gate: config.probability_gate,
        }
    }
}

impl DifficultyStrategy for ClassifierStrategy {
    fn predict_adjustment(&self, score: f64, trend: f64, consecutive_low: u32) -> Adjustment {
        if consecutive_low >= self.forced_decrease_streak {
            return Adjustment::Decrease;
        }

        let Some(p_increase) = self.classifier.predict_increase(score, trend) else {
            return self.fallback.predict_adjustment(score, trend, consecutive_low);
        };

        if p_increase > self.probability_gate && score > self.high_score_threshold {
            Adjustment::Increase
        } else if (1.0 - p_increase) > self.probability_gate && score < self.low_score_threshold {
            Adjustment::Decrease
        } else {
            Adjustment::Hold
        }
    }

    fn name(&self) -> &'static str {
        "classifier"
    }
}
