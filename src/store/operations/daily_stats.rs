use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub user_id: String,
    /// ISO date, e.g. "2026-08-25".
    pub date: String,
    pub activity_count: u32,
    pub learning_time_secs: f64,
}

impl Store {
    /// Adds one activity to the user's stat row for the given day.
    /// Transactional read-modify-write so concurrent recordings don't lose
    /// increments.
    pub fn record_daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
        time_secs: f64,
    ) -> Result<(), StoreError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let key = keys::daily_stat_key(user_id, &date_str);
        let key_bytes = key.as_bytes().to_vec();
        let user_id_owned = user_id.to_string();

        self.daily_stats
            .transaction(move |tx| {
                let mut stat = match tx.get(key_bytes.as_slice())? {
                    Some(raw) => serde_json::from_slice::<DailyStat>(&raw).unwrap_or(DailyStat {
                        user_id: user_id_owned.clone(),
                        date: date_str.clone(),
                        activity_count: 0,
                        learning_time_secs: 0.0,
                    }),
                    None => DailyStat {
                        user_id: user_id_owned.clone(),
                        date: date_str.clone(),
                        activity_count: 0,
                        learning_time_secs: 0.0,
                    },
                };
                stat.activity_count += 1;
                stat.learning_time_secs += time_secs;
                let bytes = match serde_json::to_vec(&stat) {
                    Ok(b) => b,
                    Err(_) => return sled::transaction::abort(()),
                };
                tx.insert(key_bytes.as_slice(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Validation("failed to serialize daily stat".to_string())
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })
    }

    pub fn put_daily_stat(&self, stat: &DailyStat) -> Result<(), StoreError> {
        let key = keys::daily_stat_key(&stat.user_id, &stat.date);
        let bytes = Self::serialize(stat)?;
        self.daily_stats.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_daily_stat(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyStat>, StoreError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let key = keys::daily_stat_key(user_id, &date_str);
        match self.daily_stats.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_daily_stats(&self, user_id: &str) -> Result<Vec<DailyStat>, StoreError> {
        let prefix = keys::daily_stat_prefix(user_id);
        let mut stats = Vec::new();
        for item in self.daily_stats.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            stats.push(Self::deserialize::<DailyStat>(&value)?);
        }
        Ok(stats)
    }

    pub fn total_learning_time_secs(&self, user_id: &str) -> Result<f64, StoreError> {
        Ok(self
            .list_daily_stats(user_id)?
            .iter()
            .map(|s| s.learning_time_secs)
            .sum())
    }

    /// Consecutive days with activity, counted back from `today`. A streak
    /// that ended yesterday still counts; a gap before yesterday breaks it.
    pub fn activity_streak_days(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<u32, StoreError> {
        let mut streak = 0u32;
        let mut day = today;

        if self.get_daily_stat(user_id, day)?.is_none() {
            // No activity yet today, start counting from yesterday.
            day = day.pred_opt().unwrap_or(day);
        }

        while let Some(stat) = self.get_daily_stat(user_id, day)? {
            if stat.activity_count == 0 {
                break;
            }
            streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }

        Ok(streak)
    }
}
