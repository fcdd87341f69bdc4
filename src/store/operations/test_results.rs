use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Speech,
    Listening,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Speech => "speech",
            TestType::Listening => "listening",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub user_id: String,
    pub test_type: TestType,
    /// Normalized score in [0, 1], equal to accuracy for both test types.
    pub score: f64,
    pub accuracy: f64,
    /// Speech tests only.
    pub words_per_minute: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn save_test_result(&self, result: &TestResult) -> Result<(), StoreError> {
        let key = keys::test_result_key(
            &result.user_id,
            result.created_at.timestamp_millis(),
            &result.id,
        );
        let bytes = Self::serialize(result)?;
        self.test_results.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Newest first, thanks to the reverse-timestamp key layout.
    pub fn list_test_results(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TestResult>, StoreError> {
        let prefix = keys::test_result_prefix(user_id);
        let mut results = Vec::new();

        for item in self.test_results.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            results.push(Self::deserialize::<TestResult>(&value)?);
            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }

    pub fn count_test_results(&self, user_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::test_result_prefix(user_id);
        let mut count = 0usize;
        for item in self.test_results.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn highest_test_score(
        &self,
        user_id: &str,
        test_type: TestType,
    ) -> Result<Option<f64>, StoreError> {
        let prefix = keys::test_result_prefix(user_id);
        let mut best: Option<f64> = None;

        for item in self.test_results.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let result: TestResult = Self::deserialize(&value)?;
            if result.test_type == test_type {
                best = Some(best.map_or(result.score, |b: f64| b.max(result.score)));
            }
        }

        Ok(best)
    }
}
