use std::sync::Arc;

use anyhow::Context;
use chess_core::ShakmatyRules;
use server::config;
use server::game::registry::MatchRegistry;
use server::routes;
use server::store::FilePositionStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    tracing::info!("Opening position store at {}", config.position_store_path);
    let store = FilePositionStore::open(&config.position_store_path)
        .context("Failed to open position store")?;

    tracing::info!(
        settle_delay_ms = config.settle_delay.as_millis() as u64,
        allow_force_outcome = config.allow_force_outcome,
        "Match settings"
    );
    let registry = Arc::new(MatchRegistry::new(
        config.clone(),
        Arc::new(ShakmatyRules),
        Arc::new(store),
    ));

    let app = routes::router(registry);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
