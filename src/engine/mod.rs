pub mod classifier;
pub mod config;
pub mod core;
pub mod state;
pub mod strategy;

pub use classifier::TrendClassifier;
pub use config::EngineConfig;
pub use core::{DifficultyEngine, EngineError, Evaluation};
pub use state::{LearnerDifficultyState, PerformanceSample};
pub use strategy::{Adjustment, ClassifierStrategy, DifficultyStrategy, RuleBasedStrategy};
