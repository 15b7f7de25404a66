//! Rules evaluator seam.
//!
//! The match server never decides legality itself. It hands the current
//! snapshot and the requested squares to a [`RulesEvaluator`] and commits
//! whatever comes back.

use shakmaty::uci::UciMove;
use shakmaty::{Chess, Position, Role};
use thiserror::Error;

use crate::snapshot::BoardSnapshot;
use crate::square::Square;
use crate::types::Side;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("illegal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },
}

/// A move the evaluator accepted, with the resulting position and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub from: Square,
    pub to: Square,
    pub snapshot: BoardSnapshot,
    pub mover: Side,
    pub caused_checkmate: bool,
    pub caused_stalemate: bool,
}

pub trait RulesEvaluator: Send + Sync {
    /// Apply `from -> to` to `board`. Rejection leaves nothing changed.
    fn try_apply_move(
        &self,
        board: &BoardSnapshot,
        from: Square,
        to: Square,
    ) -> Result<AppliedMove, RulesError>;

    fn serialize(&self, position: &Chess) -> BoardSnapshot;

    fn deserialize(&self, snapshot: &str) -> Result<Chess, RulesError>;
}

/// Standard chess via shakmaty. Pawns reaching the last rank become queens.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl RulesEvaluator for ShakmatyRules {
    fn try_apply_move(
        &self,
        board: &BoardSnapshot,
        from: Square,
        to: Square,
    ) -> Result<AppliedMove, RulesError> {
        let mut pos = board.to_position()?;
        let mover: Side = pos.turn().into();

        let normal = UciMove::Normal {
            from: from.to_shakmaty(),
            to: to.to_shakmaty(),
            promotion: None,
        };
        let legal_move = match normal.to_move(&pos) {
            Ok(m) => m,
            Err(_) => {
                let promoting = UciMove::Normal {
                    from: from.to_shakmaty(),
                    to: to.to_shakmaty(),
                    promotion: Some(Role::Queen),
                };
                promoting
                    .to_move(&pos)
                    .map_err(|_| RulesError::IllegalMove { from, to })?
            }
        };

        pos.play_unchecked(legal_move);

        Ok(AppliedMove {
            from,
            to,
            snapshot: self.serialize(&pos),
            mover,
            caused_checkmate: pos.is_checkmate(),
            caused_stalemate: pos.is_stalemate(),
        })
    }

    fn serialize(&self, position: &Chess) -> BoardSnapshot {
        BoardSnapshot::from_position(position)
    }

    fn deserialize(&self, snapshot: &str) -> Result<Chess, RulesError> {
        BoardSnapshot::parse(snapshot)?.to_position()
    }
}
