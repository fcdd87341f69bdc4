use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::DifficultyEngine;
use crate::middleware::rate_limit::RateLimitState;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    engine: Arc<DifficultyEngine>,
    rate_limit: Arc<RateLimitState>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<DifficultyEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let rate_limit = Arc::new(RateLimitState::new(
            config.rate_limit.window_secs,
            config.rate_limit.max_requests,
        ));

        Self {
            store,
            engine,
            rate_limit,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_arc(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn engine(&self) -> &DifficultyEngine {
        &self.engine
    }

    pub fn rate_limit(&self) -> &Arc<RateLimitState> {
        &self.rate_limit
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use crate::config::Config;
    use crate::engine::{DifficultyEngine, EngineConfig};
    use crate::store::Store;

    use super::*;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let cfg = Config::from_env();
        let store = Arc::new(Store::open(dir.path().join("state.sled").to_str().unwrap()).unwrap());
        let engine = Arc::new(
            DifficultyEngine::new(
                EngineConfig::default(),
                store.clone(),
                false,
                &dir.path().join("model.json"),
            )
            .unwrap(),
        );
        let (tx, _) = broadcast::channel(4);
        AppState::new(store, engine, &cfg, tx)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        state.shutdown_tx().send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }
}
