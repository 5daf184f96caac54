mod config;
mod error;
mod models;
mod routes;
mod services;
mod state;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::services::throttle::ThrottleConfig;
use crate::upstream::ApiClient;
use crate::upstream::cache::{self, ResponseCache};

const SLOT_PRUNE_EVERY: Duration = Duration::from_secs(300);
const SLOT_MAX_IDLE: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parkway=info,tower_http=info")))
        .init();

    if let Err(message) = run().await {
        tracing::error!(%message, "parkway exited");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = config::AppConfig::from_env().map_err(|e| e.to_string())?;

    let cache = ResponseCache::new(config.cache.ttl);
    let client = ApiClient::new(&config.upstream, cache.clone()).map_err(|e| e.to_string())?;
    let upstream: Arc<dyn upstream::Upstream> = Arc::new(client);

    let port = config.port;
    let base_url = config.upstream.base_url.clone();
    let sweep_every = config.cache.sweep_interval;
    let outbox_config = config.outbox;
    let state = state::AppState::new(config, upstream.clone(), ThrottleConfig::from_env());

    // Background tasks.
    let _sweep = cache::spawn_sweep_task(cache, sweep_every);
    let _flush = services::outbox::spawn_flush_task(state.outbox.clone(), upstream, outbox_config);
    let _prune = services::slots::spawn_prune_task(state.slots.clone(), SLOT_PRUNE_EVERY, SLOT_MAX_IDLE);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("failed to bind port {port}: {e}"))?;

    tracing::info!(%port, upstream = %base_url, "parkway listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server failed: {e}"))
}
