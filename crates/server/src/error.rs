use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::Side;
use serde_json::json;

use crate::store::StoreError;

/// Why a match command was not acted upon.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("match is over")]
    MatchOver,

    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("participant has no side")]
    NoSide,

    #[error("not your turn ({side_to_move} to move)")]
    NotYourTurn { side_to_move: Side },

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("{side} already assigned to participant {holder}")]
    DoubleAssignment { side: Side, holder: u64 },

    #[error("forcing outcomes is disabled")]
    ForceOutcomeDisabled,

    #[error("no saved position for this match")]
    NoSavedPosition,

    #[error("saved position is unusable: {0}")]
    CorruptSavedPosition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MatchError {
    /// Stable short code sent to participants in `move_rejected`.
    pub fn reason(&self) -> &'static str {
        match self {
            MatchError::MatchOver => "match_over",
            MatchError::InvalidSquare(_) => "invalid_square",
            MatchError::NoSide => "no_side",
            MatchError::NotYourTurn { .. } => "not_your_turn",
            MatchError::IllegalMove(_) => "illegal_move",
            MatchError::DoubleAssignment { .. } => "double_assignment",
            MatchError::ForceOutcomeDisabled => "force_disabled",
            MatchError::NoSavedPosition => "no_saved_position",
            MatchError::CorruptSavedPosition(_) => "corrupt_saved_position",
            MatchError::Store(_) => "store_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Match(#[from] MatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Match(MatchError::Store(e)) => {
                tracing::error!("Position store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Position store error".to_string())
            }
            AppError::Match(MatchError::NoSavedPosition) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Match(e @ MatchError::CorruptSavedPosition(_)) => {
                tracing::warn!("{e}");
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::Match(e) => (StatusCode::CONFLICT, e.to_string()),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
