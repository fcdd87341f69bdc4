use std::collections::HashMap;

use chrono::Utc;

use crate::store::operations::game_scores::GameScore;
use crate::store::operations::test_results::TestResult;
use crate::store::Store;

/// Rebuilds yesterday's per-user activity counts from the raw test results
/// and game scores. The live counters in `record_daily_activity` can drift
/// if a request dies between writes; this pass makes the stored stats match
/// the raw events again. Learning time is only tracked live and is kept
/// as-is.
pub async fn run(store: &Store) {
    tracing::debug!("daily_aggregation: start");

    let Some(yesterday) = Utc::now().date_naive().pred_opt() else {
        return;
    };
    let date_str = yesterday.format("%Y-%m-%d").to_string();

    let mut counts: HashMap<String, u32> = HashMap::new();

    for item in store.test_results.iter() {
        let (_, v) = match item {
            Ok(kv) => kv,
            Err(e) => {
                tracing::error!(error=%e, "daily_aggregation: scan failed");
                return;
            }
        };
        let Ok(result) = serde_json::from_slice::<TestResult>(&v) else {
            continue;
        };
        if result.created_at.date_naive() == yesterday {
            *counts.entry(result.user_id).or_default() += 1;
        }
    }

    for item in store.game_scores.iter() {
        let (_, v) = match item {
            Ok(kv) => kv,
            Err(e) => {
                tracing::error!(error=%e, "daily_aggregation: scan failed");
                return;
            }
        };
        let Ok(score) = serde_json::from_slice::<GameScore>(&v) else {
            continue;
        };
        if score.created_at.date_naive() == yesterday {
            *counts.entry(score.user_id).or_default() += 1;
        }
    }

    let mut updated = 0u32;
    for (user_id, count) in &counts {
        let existing = match store.get_daily_stat(user_id, yesterday) {
            Ok(stat) => stat,
            Err(e) => {
                tracing::warn!(user_id, error=%e, "daily_aggregation: read failed");
                continue;
            }
        };

        let mut stat = existing.unwrap_or(crate::store::DailyStat {
            user_id: user_id.clone(),
            date: date_str.clone(),
            activity_count: 0,
            learning_time_secs: 0.0,
        });

        if stat.activity_count == *count {
            continue;
        }

        stat.activity_count = *count;
        if let Err(e) = store.put_daily_stat(&stat) {
            tracing::warn!(user_id, error=%e, "daily_aggregation: write failed");
            continue;
        }
        updated += 1;
    }

    tracing::info!(
        date = %date_str,
        users = counts.len(),
        updated,
        "daily_aggregation: done"
    );
}
