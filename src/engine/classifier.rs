use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::config::EngineConfig;
use crate::engine::state::PerformanceSample;

/// Logistic model over (score, trend) predicting whether the next
/// difficulty move should be an increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendModel {
    pub weights: [f64; 2],
    pub bias: f64,
    pub trained_samples: usize,
    pub updated_at: DateTime<Utc>,
}

/// Seed pairs used when no persisted model exists: clearly-high scores with
/// rising trend as positives, clearly-low with falling trend as negatives.
const SEED_SAMPLES: [([f64; 2], bool); 8] = [
    ([0.90, 0.20], true),
    ([0.85, 0.10], true),
    ([0.80, 0.05], true),
    ([0.78, 0.00], true),
    ([0.35, 0.00], false),
    ([0.30, -0.20], false),
    ([0.25, -0.10], false),
    ([0.20, -0.30], false),
];

const FIT_EPOCHS: usize = 300;
const FIT_LEARNING_RATE: f64 = 0.5;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl TrendModel {
    pub fn fit(samples: &[([f64; 2], bool)]) -> Self {
        let mut weights = [0.0_f64; 2];
        let mut bias = 0.0_f64;
        let n = samples.len().max(1) as f64;

        for _ in 0..FIT_EPOCHS {
            let mut grad_w = [0.0_f64; 2];
            let mut grad_b = 0.0_f64;
            for (features, label) in samples {
                let z = weights[0] * features[0] + weights[1] * features[1] + bias;
                let error = sigmoid(z) - if *label { 1.0 } else { 0.0 };
                grad_w[0] += error * features[0];
                grad_w[1] += error * features[1];
                grad_b += error;
            }
            weights[0] -= FIT_LEARNING_RATE * grad_w[0] / n;
            weights[1] -= FIT_LEARNING_RATE * grad_w[1] / n;
            bias -= FIT_LEARNING_RATE * grad_b / n;
        }

        Self {
            weights,
            bias,
            trained_samples: samples.len(),
            updated_at: Utc::now(),
        }
    }

    pub fn predict_increase(&self, score: f64, trend: f64) -> f64 {
        sigmoid(self.weights[0] * score + self.weights[1] * trend + self.bias)
    }
}

/// Process-wide classifier shared by all learners. Predictions take the read
/// lock, retrain and persist take the write lock.
pub struct TrendClassifier {
    model: RwLock<TrendModel>,
    model_path: Option<PathBuf>,
    samples_since_retrain: AtomicU32,
}

impl TrendClassifier {
    /// Loads the persisted model, seeding a fresh one on any load failure.
    /// The seed model is persisted immediately so later restarts reuse it.
    pub fn load_or_seed(model_path: &Path) -> Self {
        let model = match std::fs::read(model_path) {
            Ok(raw) => match serde_json::from_slice::<TrendModel>(&raw) {
                Ok(model) => {
                    tracing::info!(path = %model_path.display(), trained_samples = model.trained_samples, "Loaded difficulty model");
                    model
                }
                Err(e) => {
                    tracing::warn!(path = %model_path.display(), error = %e, "Corrupt difficulty model, reseeding");
                    TrendModel::fit(&SEED_SAMPLES)
                }
            },
            Err(_) => {
                tracing::info!(path = %model_path.display(), "No difficulty model on disk, seeding");
                TrendModel::fit(&SEED_SAMPLES)
            }
        };

        let classifier = Self {
            model: RwLock::new(model),
            model_path: Some(model_path.to_path_buf()),
            samples_since_retrain: AtomicU32::new(0),
        };
        classifier.persist();
        classifier
    }

    /// Classifier without disk persistence.
    pub fn in_memory() -> Self {
        Self {
            model: RwLock::new(TrendModel::fit(&SEED_SAMPLES)),
            model_path: None,
            samples_since_retrain: AtomicU32::new(0),
        }
    }

    /// None on lock poisoning; the caller falls back to the rule strategy.
    pub fn predict_increase(&self, score: f64, trend: f64) -> Option<f64> {
        match self.model.read() {
            Ok(model) => Some(model.predict_increase(score, trend)),
            Err(e) => {
                tracing::warn!(error = %e, "Difficulty model lock poisoned");
                None
            }
        }
    }

    pub fn model_snapshot(&self) -> Option<TrendModel> {
        self.model.read().ok().map(|m| m.clone())
    }

    /// Called once per recorded sample. Retrains from the learner's history
    /// when it is long enough, debounced to once per
    /// `retrain_debounce_samples` new samples. All failures are swallowed.
    pub fn observe(&self, history: &VecDeque<PerformanceSample>, config: &EngineConfig) {
        let pending = self.samples_since_retrain.fetch_add(1, Ordering::Relaxed) + 1;

        if history.len() < config.retrain_min_history {
            return;
        }
        if pending < config.retrain_debounce_samples {
            return;
        }

        let pairs = derive_training_pairs(history);
        if pairs.len() < config.retrain_min_samples {
            return;
        }

        let new_model = TrendModel::fit(&pairs);
        match self.model.write() {
            Ok(mut model) => {
                *model = new_model;
                self.samples_since_retrain.store(0, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping retrain, difficulty model lock poisoned");
                return;
            }
        }
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.model_path else {
            return;
        };
        let snapshot = match self.model.read() {
            Ok(model) => model.clone(),
            Err(_) => return,
        };
        let bytes = match serde_json::to_vec_pretty(&snapshot) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize difficulty model");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, bytes) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist difficulty model");
        }
    }
}

/// Consecutive history pairs: the feature is the earlier sample's score
/// (second slot reserved), the label is whether difficulty rose afterwards.
fn derive_training_pairs(history: &VecDeque<PerformanceSample>) -> Vec<([f64; 2], bool)> {
    let samples: Vec<&PerformanceSample> = history.iter().collect();
    samples
        .windows(2)
        .map(|w| ([w[0].score, 0.0], w[1].difficulty > w[0].difficulty))
        .collect()
}
