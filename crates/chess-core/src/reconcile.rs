//! Participant-side board reconciliation.
//!
//! Each published snapshot is compared square by square with what the
//! participant currently shows. Anything that differs is torn down and
//! rebuilt from the snapshot, so only the latest snapshot ever matters.

use shakmaty::Piece;

use crate::rules::RulesError;
use crate::snapshot::{BoardSnapshot, Occupancy};
use crate::square::Square;

/// One square whose local representation had to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareRepair {
    pub square: Square,
    /// Stale piece that was removed, if any.
    pub removed: Option<Piece>,
    /// Piece instantiated from the snapshot, if any.
    pub placed: Option<Piece>,
}

/// What a participant currently shows on its board.
#[derive(Debug, Clone)]
pub struct LocalBoard {
    occupancy: Occupancy,
    snapshot: Option<BoardSnapshot>,
}

impl LocalBoard {
    pub fn empty() -> Self {
        Self {
            occupancy: Occupancy::empty(),
            snapshot: None,
        }
    }

    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Result<Self, RulesError> {
        Ok(Self {
            occupancy: snapshot.occupancy()?,
            snapshot: Some(snapshot.clone()),
        })
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.occupancy.get(square)
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    /// Last snapshot reconciled into this board.
    pub fn snapshot(&self) -> Option<&BoardSnapshot> {
        self.snapshot.as_ref()
    }

    /// Bring the board in line with `next` over all 64 squares.
    ///
    /// Re-applying the same snapshot returns no repairs. A snapshot that
    /// fails to parse leaves the board untouched.
    pub fn reconcile(&mut self, next: &BoardSnapshot) -> Result<Vec<SquareRepair>, RulesError> {
        let target = next.occupancy()?;
        let mut repairs = Vec::new();

        for square in Square::all() {
            let current = self.occupancy.get(square);
            let wanted = target.get(square);
            if current != wanted {
                self.occupancy.set(square, wanted);
                repairs.push(SquareRepair {
                    square,
                    removed: current,
                    placed: wanted,
                });
            }
        }

        self.snapshot = Some(next.clone());
        Ok(repairs)
    }

    /// Move a piece locally ahead of server confirmation.
    ///
    /// Returns false when `from` is empty. The authoritative snapshot is
    /// left alone so a rollback can restore it.
    pub fn move_optimistic(&mut self, from: Square, to: Square) -> bool {
        let Some(piece) = self.occupancy.get(from) else {
            return false;
        };
        self.occupancy.set(from, None);
        self.occupancy.set(to, Some(piece));
        true
    }

    /// Discard optimistic edits by reconciling against the last snapshot.
    pub fn rollback(&mut self) -> Vec<SquareRepair> {
        match self.snapshot.clone() {
            Some(snapshot) => self.reconcile(&snapshot).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl Default for LocalBoard {
    fn default() -> Self {
        Self::empty()
    }
}
