pub mod health;
pub mod match_ws;
pub mod matches;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::game::registry::MatchRegistry;

pub fn router(registry: Arc<MatchRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Live match socket
        .route("/ws/matches/{match_id}", get(match_ws::ws_handler))
        // Match administration
        .route("/api/matches", get(matches::list_matches))
        .route("/api/matches/{match_id}", get(matches::get_match))
        .route("/api/matches/{match_id}/new-match", post(matches::new_match))
        .route("/api/matches/{match_id}/save", post(matches::save_position))
        .route("/api/matches/{match_id}/load", post(matches::load_position))
        .route("/api/matches/{match_id}/force-outcome", post(matches::force_outcome))
        .layer(Extension(registry))
        .layer(CompressionLayer::new())
        .layer(cors)
}
