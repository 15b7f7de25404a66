//! Turn authority: who plays which side, and whose move it is.

use chess_core::{Side, TurnCounter};

use super::ParticipantId;
use crate::error::MatchError;

/// Identity to side mapping. Slots fill White first, then Black, and are
/// never reassigned until the whole assignment is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerAssignment {
    white: Option<ParticipantId>,
    black: Option<ParticipantId>,
}

impl PlayerAssignment {
    pub fn side_of(&self, participant: ParticipantId) -> Option<Side> {
        if self.white == Some(participant) {
            Some(Side::White)
        } else if self.black == Some(participant) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn holder(&self, side: Side) -> Option<ParticipantId> {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    /// Return the participant's side, claiming the next free slot if it has none.
    pub fn assign(&mut self, participant: ParticipantId) -> Result<Option<Side>, MatchError> {
        if let Some(side) = self.side_of(participant) {
            return Ok(Some(side));
        }
        let side = if self.white.is_none() {
            Side::White
        } else if self.black.is_none() {
            Side::Black
        } else {
            return Ok(None);
        };
        self.claim(side, participant)?;
        Ok(Some(side))
    }

    /// Check-and-set on a single slot.
    fn claim(&mut self, side: Side, participant: ParticipantId) -> Result<(), MatchError> {
        let slot = match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        };
        match *slot {
            None => {
                *slot = Some(participant);
                Ok(())
            }
            Some(holder) if holder == participant => Ok(()),
            Some(holder) => Err(MatchError::DoubleAssignment {
                side,
                holder: holder.0,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TurnAuthority {
    counter: TurnCounter,
    assignment: PlayerAssignment,
}

impl TurnAuthority {
    pub fn turn(&self) -> u32 {
        self.counter.value()
    }

    pub fn side_to_move(&self) -> Side {
        self.counter.side_to_move()
    }

    pub fn side_of(&self, participant: ParticipantId) -> Option<Side> {
        self.assignment.side_of(participant)
    }

    pub fn holder(&self, side: Side) -> Option<ParticipantId> {
        self.assignment.holder(side)
    }

    /// Idempotent side assignment.
    pub fn assign_side(&mut self, participant: ParticipantId) -> Result<Option<Side>, MatchError> {
        self.assignment.assign(participant)
    }

    /// The participant's side, if it owns the side to move.
    pub fn authorize(&self, participant: ParticipantId) -> Result<Side, MatchError> {
        let side = self.side_of(participant).ok_or(MatchError::NoSide)?;
        let side_to_move = self.side_to_move();
        if side != side_to_move {
            return Err(MatchError::NotYourTurn { side_to_move });
        }
        Ok(side)
    }

    /// Record one accepted move.
    pub fn advance(&mut self) -> Side {
        self.counter.advance();
        self.side_to_move()
    }

    /// Start over at `counter` and re-seat `participants` in join order.
    pub fn reset(
        &mut self,
        counter: TurnCounter,
        participants: &[ParticipantId],
    ) -> Vec<(ParticipantId, Option<Side>)> {
        self.counter = counter;
        self.assignment = PlayerAssignment::default();
        participants
            .iter()
            .map(|&p| {
                let side = self.assignment.assign(p).unwrap_or_else(|e| {
                    tracing::error!(participant = p.0, "side assignment failed on reset: {e}");
                    None
                });
                (p, side)
            })
            .collect()
    }
}
