#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chess_core::ShakmatyRules;
use reqwest::Client;
use server::config::Config;
use server::events::MatchEvent;
use server::game::registry::MatchRegistry;
use server::store::{MemoryPositionStore, PositionStore};
use tokio::sync::broadcast;

/// Config tuned for tests: short settle delay, admin hooks on.
pub fn test_config() -> Config {
    Config {
        settle_delay: Duration::from_millis(20),
        allow_force_outcome: true,
        ..Config::default()
    }
}

pub fn registry() -> Arc<MatchRegistry> {
    registry_with(test_config())
}

pub fn registry_with(config: Config) -> Arc<MatchRegistry> {
    registry_with_store(config, Arc::new(MemoryPositionStore::new()))
}

pub fn registry_with_store(config: Config, store: Arc<dyn PositionStore>) -> Arc<MatchRegistry> {
    Arc::new(MatchRegistry::new(config, Arc::new(ShakmatyRules), store))
}

/// Serve the full router on an ephemeral port and return its base URL.
pub async fn spawn_server(registry: Arc<MatchRegistry>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::routes::router(registry);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// Generate a unique suffix based on timestamp to avoid collisions.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

/// Everything currently buffered on a subscription.
pub fn drain(rx: &mut broadcast::Receiver<MatchEvent>) -> Vec<MatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
