use serde::{Deserialize, Serialize};

/// Tunable parameters of the adaptive difficulty engine. Defaults are the
/// production values; alternates can be loaded from JSON and validated
/// before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub initial_difficulty: f64,
    /// Scores below this count as low and feed the decrease streak.
    pub low_score_threshold: f64,
    /// Scores above this are increase candidates.
    pub high_score_threshold: f64,
    /// This many consecutive low scores force a decrease regardless of
    /// what the strategy would otherwise decide.
    pub forced_decrease_streak: u32,
    /// Minimum classifier probability before its vote is taken.
    pub probability_gate: f64,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Reference score when the history is too short for a trend window.
    #[serde(default = "default_neutral_baseline")]
    pub neutral_baseline: f64,
    pub step_large: f64,
    pub step_medium: f64,
    pub step_small: f64,
    /// Score above which an increase takes the large step.
    pub large_increase_threshold: f64,
    /// Score below which a decrease takes the large step.
    pub large_decrease_threshold: f64,
    #[serde(default = "default_retrain_min_history")]
    pub retrain_min_history: usize,
    #[serde(default = "default_retrain_min_samples")]
    pub retrain_min_samples: usize,
    /// Retrain at most once per this many new samples.
    #[serde(default = "default_retrain_debounce_samples")]
    pub retrain_debounce_samples: u32,
}

fn default_history_cap() -> usize {
    20
}
fn default_trend_window() -> usize {
    3
}
fn default_neutral_baseline() -> f64 {
    0.5
}
fn default_retrain_min_history() -> usize {
    10
}
fn default_retrain_min_samples() -> usize {
    10
}
fn default_retrain_debounce_samples() -> u32 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_difficulty: 0.5,
            max_difficulty: 3.0,
            initial_difficulty: 1.0,
            low_score_threshold: 0.4,
            high_score_threshold: 0.75,
            forced_decrease_streak: 3,
            probability_gate: 0.65,
            history_cap: 20,
            trend_window: 3,
            neutral_baseline: 0.5,
            step_large: 0.20,
            step_medium: 0.15,
            step_small: 0.10,
            large_increase_threshold: 0.85,
            large_decrease_threshold: 0.3,
            retrain_min_history: 10,
            retrain_min_samples: 10,
            retrain_debounce_samples: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_difficulty < self.max_difficulty) {
            return Err("min_difficulty must be below max_difficulty".to_string());
        }
        if self.initial_difficulty < self.min_difficulty
            || self.initial_difficulty > self.max_difficulty
        {
            return Err("initial_difficulty must lie within the difficulty bounds".to_string());
        }
        if !(0.0..=1.0).contains(&self.low_score_threshold)
            || !(0.0..=1.0).contains(&self.high_score_threshold)
        {
            return Err("score thresholds must lie in [0, 1]".to_string());
        }
        if self.low_score_threshold >= self.high_score_threshold {
            return Err("low_score_threshold must be below high_score_threshold".to_string());
        }
        if self.forced_decrease_streak == 0 {
            return Err("forced_decrease_streak must be at least 1".to_string());
        }
        if !(0.5..1.0).contains(&self.probability_gate) {
            return Err("probability_gate must lie in [0.5, 1)".to_string());
        }
        if self.history_cap == 0 || self.trend_window == 0 {
            return Err("history_cap and trend_window must be positive".to_string());
        }
        if self.trend_window > self.history_cap {
            return Err("trend_window cannot exceed history_cap".to_string());
        }
        if !(0.0..=1.0).contains(&self.neutral_baseline) {
            return Err("neutral_baseline must lie in [0, 1]".to_string());
        }
        for (name, step) in [
            ("step_large", self.step_large),
            ("step_medium", self.step_medium),
            ("step_small", self.step_small),
        ] {
            if !step.is_finite() || step <= 0.0 {
                return Err(format!("{name} must be positive"));
            }
        }
        if self.step_large < self.step_medium || self.step_medium < self.step_small {
            return Err("steps must be ordered large >= medium >= small".to_string());
        }
        if self.large_increase_threshold <= self.high_score_threshold {
            return Err(
                "large_increase_threshold must exceed high_score_threshold".to_string(),
            );
        }
        if self.large_decrease_threshold >= self.low_score_threshold {
            return Err("large_decrease_threshold must be below low_score_threshold".to_string());
        }
        if self.retrain_min_history == 0 || self.retrain_min_samples == 0 {
            return Err("retrain thresholds must be positive".to_string());
        }
        if self.retrain_debounce_samples == 0 {
            return Err("retrain_debounce_samples must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.min_difficulty = 3.0;
        cfg.max_difficulty = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut cfg = EngineConfig::default();
        cfg.low_score_threshold = 0.8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_streak_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.forced_decrease_streak = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn steps_must_be_ordered() {
        let mut cfg = EngineConfig::default();
        cfg.step_small = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_without_optional_fields_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{
                "minDifficulty": 0.5,
                "maxDifficulty": 3.0,
                "initialDifficulty": 1.0,
                "lowScoreThreshold": 0.4,
                "highScoreThreshold": 0.75,
                "forcedDecreaseStreak": 3,
                "probabilityGate": 0.65,
                "stepLarge": 0.2,
                "stepMedium": 0.15,
                "stepSmall": 0.1,
                "largeIncreaseThreshold": 0.85,
                "largeDecreaseThreshold": 0.3
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.history_cap, 20);
        assert_eq!(cfg.trend_window, 3);
        assert_eq!(cfg.retrain_debounce_samples, 5);
        assert!(cfg.validate().is_ok());
    }
}
