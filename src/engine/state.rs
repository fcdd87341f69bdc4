use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub difficulty: f64,
}

/// Per-learner adaptive state. The history is a bounded ring: appending past
/// the cap evicts the oldest sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerDifficultyState {
    pub current_difficulty: f64,
    pub consecutive_low_scores: u32,
    pub performance_history: VecDeque<PerformanceSample>,
}

impl Default for LearnerDifficultyState {
    fn default() -> Self {
        Self {
            current_difficulty: 1.0,
            consecutive_low_scores: 0,
            performance_history: VecDeque::new(),
        }
    }
}

impl LearnerDifficultyState {
    pub fn new(initial_difficulty: f64) -> Self {
        Self {
            current_difficulty: initial_difficulty,
            consecutive_low_scores: 0,
            performance_history: VecDeque::new(),
        }
    }

    pub fn push_sample(&mut self, sample: PerformanceSample, cap: usize) {
        self.performance_history.push_back(sample);
        while self.performance_history.len() > cap {
            self.performance_history.pop_front();
        }
    }

    /// Mean score of the most recent `window` samples, None when the
    /// history is shorter than the window.
    pub fn recent_mean_score(&self, window: usize) -> Option<f64> {
        if window == 0 || self.performance_history.len() < window {
            return None;
        }
        let sum: f64 = self
            .performance_history
            .iter()
            .rev()
            .take(window)
            .map(|s| s.score)
            .sum();
        Some(sum / window as f64)
    }
}
