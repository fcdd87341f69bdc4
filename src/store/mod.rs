pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

pub use operations::daily_stats::DailyStat;
pub use operations::difficulty;
pub use operations::game_scores::GameScore;
pub use operations::password_resets::PasswordResetToken;
pub use operations::sessions::Session;
pub use operations::test_results::{TestResult, TestType};
pub use operations::users::{User, UserType};

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub users: sled::Tree,
    pub sessions: sled::Tree,
    pub test_results: sled::Tree,
    pub game_scores: sled::Tree,
    pub difficulty_states: sled::Tree,
    pub daily_stats: sled::Tree,
    pub password_reset_tokens: sled::Tree,
    pub config_versions: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let users = db.open_tree(trees::USERS)?;
        let sessions = db.open_tree(trees::SESSIONS)?;
        let test_results = db.open_tree(trees::TEST_RESULTS)?;
        let game_scores = db.open_tree(trees::GAME_SCORES)?;
        let difficulty_states = db.open_tree(trees::DIFFICULTY_STATES)?;
        let daily_stats = db.open_tree(trees::DAILY_STATS)?;
        let password_reset_tokens = db.open_tree(trees::PASSWORD_RESET_TOKENS)?;
        let config_versions = db.open_tree(trees::CONFIG_VERSIONS)?;

        Ok(Self {
            db,
            users,
            sessions,
            test_results,
            game_scores,
            difficulty_states,
            daily_stats,
            password_reset_tokens,
            config_versions,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
