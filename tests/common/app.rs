use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use literacy_backend::config::Config;
use literacy_backend::engine::{DifficultyEngine, EngineConfig};
use literacy_backend::routes::build_router;
use literacy_backend::state::AppState;
use literacy_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

async fn spawn_with_limits(api_limit: u64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("literacy-test.sled");
    let model_path = temp_dir.path().join("difficulty-model.json");

    // Build the Config directly; set_var would race across parallel tests.
    let test_secret = format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4());
    let test_refresh_secret = format!("integration-test-refresh-secret-{}", uuid::Uuid::new_v4());

    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: test_secret,
        jwt_expires_in_hours: 24,
        refresh_jwt_secret: test_refresh_secret,
        refresh_token_expires_in_hours: 168,
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: false,
        rate_limit: literacy_backend::config::RateLimitConfig {
            window_secs: 60,
            max_requests: api_limit,
        },
        worker: literacy_backend::config::WorkerConfig {
            is_leader: false,
            enable_daily_aggregation: false,
        },
        engine: literacy_backend::config::EngineEnvConfig {
            classifier_enabled: true,
            model_path: model_path.to_string_lossy().to_string(),
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let engine = Arc::new(
        DifficultyEngine::new(
            EngineConfig::default(),
            store.clone(),
            config.engine.classifier_enabled,
            &model_path,
        )
        .expect("engine config"),
    );
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, engine, &config, shutdown_tx);

    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with_limits(200).await
}

pub async fn spawn_test_server_with_limits(api_limit: u64) -> TestApp {
    spawn_with_limits(api_limit).await
}
