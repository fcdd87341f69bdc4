use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScore {
    pub id: String,
    pub user_id: String,
    pub game_type: String,
    /// Normalized into [0, 1] against max_score at save time.
    pub score: f64,
    pub raw_score: f64,
    pub max_score: f64,
    pub level: u32,
    pub time_taken_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn save_game_score(&self, score: &GameScore) -> Result<(), StoreError> {
        let key = keys::game_score_key(
            &score.user_id,
            score.created_at.timestamp_millis(),
            &score.id,
        );
        let bytes = Self::serialize(score)?;
        self.game_scores.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Newest first.
    pub fn list_game_scores(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GameScore>, StoreError> {
        let prefix = keys::game_score_prefix(user_id);
        let mut scores = Vec::new();

        for item in self.game_scores.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            scores.push(Self::deserialize::<GameScore>(&value)?);
            if scores.len() >= limit {
                break;
            }
        }

        Ok(scores)
    }

    /// Best normalized score per game type.
    pub fn highest_game_scores(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, f64>, StoreError> {
        let prefix = keys::game_score_prefix(user_id);
        let mut best: HashMap<String, f64> = HashMap::new();

        for item in self.game_scores.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let score: GameScore = Self::deserialize(&value)?;
            best.entry(score.game_type)
                .and_modify(|b| *b = b.max(score.score))
                .or_insert(score.score);
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    fn sample_score(id: &str, game_type: &str, score: f64, age_mins: i64) -> GameScore {
        GameScore {
            id: id.to_string(),
            user_id: "u1".to_string(),
            game_type: game_type.to_string(),
            score,
            raw_score: score * 100.0,
            max_score: 100.0,
            level: 1,
            time_taken_secs: Some(60.0),
            created_at: Utc::now() - Duration::minutes(age_mins),
        }
    }

    #[test]
    fn scores_are_listed_newest_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("games-db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        store
            .save_game_score(&sample_score("g_old", "word_jumble", 0.5, 10))
            .unwrap();
        store
            .save_game_score(&sample_score("g_new", "word_jumble", 0.8, 0))
            .unwrap();

        let scores = store.list_game_scores("u1", 10).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].id, "g_new");
    }

    #[test]
    fn highest_is_tracked_per_game_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("games-db2");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        store
            .save_game_score(&sample_score("g1", "word_jumble", 0.4, 3))
            .unwrap();
        store
            .save_game_score(&sample_score("g2", "word_jumble", 0.9, 2))
            .unwrap();
        store
            .save_game_score(&sample_score("g3", "memory_match", 0.6, 1))
            .unwrap();

        let best = store.highest_game_scores("u1").unwrap();
        assert_eq!(best.get("word_jumble"), Some(&0.9));
        assert_eq!(best.get("memory_match"), Some(&0.6));
    }
}
