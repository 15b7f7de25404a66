use std::sync::Arc;

use axum::{extract::Path, Extension, Json};

use crate::error::AppError;
use crate::game::lifecycle::ForcedOutcome;
use crate::game::registry::MatchRegistry;
use crate::game::{MatchContext, MatchSummary};
use crate::store::SavedPosition;

async fn find(registry: &MatchRegistry, match_id: &str) -> Result<Arc<MatchContext>, AppError> {
    registry
        .get(match_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Match '{match_id}' not found")))
}

/// GET /api/matches
pub async fn list_matches(
    Extension(registry): Extension<Arc<MatchRegistry>>,
) -> Json<Vec<MatchSummary>> {
    Json(registry.list().await)
}

/// GET /api/matches/{match_id}
pub async fn get_match(
    Extension(registry): Extension<Arc<MatchRegistry>>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchSummary>, AppError> {
    let context = find(&registry, &match_id).await?;
    Ok(Json(context.summary().await))
}

/// POST /api/matches/{match_id}/new-match
pub async fn new_match(
    Extension(registry): Extension<Arc<MatchRegistry>>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchSummary>, AppError> {
    let context = find(&registry, &match_id).await?;
    Ok(Json(context.new_match().await))
}

/// POST /api/matches/{match_id}/save
pub async fn save_position(
    Extension(registry): Extension<Arc<MatchRegistry>>,
    Path(match_id): Path<String>,
) -> Result<Json<SavedPosition>, AppError> {
    let context = find(&registry, &match_id).await?;
    Ok(Json(context.save_position().await?))
}

/// POST /api/matches/{match_id}/load
pub async fn load_position(
    Extension(registry): Extension<Arc<MatchRegistry>>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchSummary>, AppError> {
    let context = find(&registry, &match_id).await?;
    Ok(Json(context.load_position().await?))
}

/// POST /api/matches/{match_id}/force-outcome
///
/// Test and admin hook; refused unless enabled in config.
pub async fn force_outcome(
    Extension(registry): Extension<Arc<MatchRegistry>>,
    Path(match_id): Path<String>,
    Json(body): Json<ForcedOutcome>,
) -> Result<Json<MatchSummary>, AppError> {
    let context = find(&registry, &match_id).await?;
    context.force_outcome(body).await?;
    Ok(Json(context.summary().await))
}
