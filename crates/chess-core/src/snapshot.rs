//! Canonical board snapshot: the single string every participant converges to.

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Piece, Position};

use crate::rules::RulesError;
use crate::square::Square;
use crate::types::Side;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Full FEN of a legal position. Equal snapshots describe equal positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardSnapshot(String);

impl BoardSnapshot {
    pub fn initial() -> Self {
        Self(STANDARD_START_FEN.to_string())
    }

    /// Parse and re-serialize so the stored text is canonical.
    pub fn parse(fen: &str) -> Result<Self, RulesError> {
        Ok(Self::from_position(&parse_position(fen)?))
    }

    pub fn from_position(pos: &Chess) -> Self {
        Self(Fen::from_position(pos, EnPassantMode::Legal).to_string())
    }

    pub fn to_position(&self) -> Result<Chess, RulesError> {
        parse_position(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Side to move according to the FEN's active-color field.
    pub fn side_to_move(&self) -> Result<Side, RulesError> {
        Ok(self.to_position()?.turn().into())
    }

    /// Occupant of every square, indexed in `Square::all()` order.
    pub fn occupancy(&self) -> Result<Occupancy, RulesError> {
        let pos = self.to_position()?;
        let mut squares = [None; 64];
        for (slot, sq) in squares.iter_mut().zip(Square::all()) {
            *slot = pos.board().piece_at(sq.to_shakmaty());
        }
        Ok(Occupancy(squares))
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_position(fen: &str) -> Result<Chess, RulesError> {
    let fen: Fen = fen
        .trim()
        .parse()
        .map_err(|e| RulesError::InvalidSnapshot(format!("{e}")))?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| RulesError::InvalidSnapshot(format!("{e}")))
}

/// Piece-per-square view of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy([Option<Piece>; 64]);

impl Occupancy {
    pub fn empty() -> Self {
        Self([None; 64])
    }

    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.0[index(sq)]
    }

    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.0[index(sq)] = piece;
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|p| p.is_some()).count()
    }
}

fn index(sq: Square) -> usize {
    usize::from(sq.file() - 1) * 8 + usize::from(sq.rank() - 1)
}
