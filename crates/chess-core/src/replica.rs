//! Participant-side replica of a match, driven purely by server messages.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::reconcile::{LocalBoard, SquareRepair};
use crate::rules::RulesError;
use crate::snapshot::BoardSnapshot;
use crate::square::Square;
use crate::types::{MatchOutcome, Side, TurnCounter};

/// Read-only view of the authoritative match plus at most one optimistic move.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    participant: Option<u64>,
    side: Option<Side>,
    turn: TurnCounter,
    outcome: MatchOutcome,
    message: String,
    board: LocalBoard,
    pending: Option<(Square, Square)>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participant(&self) -> Option<u64> {
        self.participant
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn turn(&self) -> u32 {
        self.turn.value()
    }

    pub fn side_to_move(&self) -> Side {
        self.turn.side_to_move()
    }

    pub fn outcome(&self) -> MatchOutcome {
        self.outcome
    }

    /// Result text to display, empty while the match is live.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn board(&self) -> &LocalBoard {
        &self.board
    }

    pub fn pending_move(&self) -> Option<(Square, Square)> {
        self.pending
    }

    /// Whether a piece of `piece_side` may be picked up right now.
    pub fn can_interact(&self, piece_side: Side) -> bool {
        !self.outcome.is_terminal()
            && self.side == Some(piece_side)
            && self.turn.side_to_move() == piece_side
    }

    /// Move a piece locally and produce the request to send.
    ///
    /// Returns `None` without touching the board when the piece is not ours
    /// to move or a previous move is still unconfirmed.
    pub fn begin_move(&mut self, from: Square, to: Square) -> Option<ClientMessage> {
        if self.pending.is_some() {
            return None;
        }
        let piece = self.board.piece_at(from)?;
        if !self.can_interact(piece.color.into()) {
            return None;
        }
        self.board.move_optimistic(from, to);
        self.pending = Some((from, to));
        Some(ClientMessage::Move {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Fold one server message into the replica, returning board repairs made.
    pub fn apply(&mut self, msg: &ServerMessage) -> Result<Vec<SquareRepair>, RulesError> {
        match msg {
            ServerMessage::Welcome {
                participant,
                side,
                turn,
                outcome,
                message,
                fen,
                ..
            } => {
                self.participant = Some(*participant);
                self.side = *side;
                self.turn = TurnCounter::new(*turn);
                self.outcome = MatchOutcome::from_code(*outcome).unwrap_or_default();
                self.message = message.clone();
                self.pending = None;
                self.reconcile(fen)
            }
            ServerMessage::SideAssigned { side } => {
                self.side = *side;
                Ok(Vec::new())
            }
            ServerMessage::TurnChanged { turn, .. } => {
                self.turn = TurnCounter::new(*turn);
                Ok(Vec::new())
            }
            ServerMessage::MoveApplied { from, to } => {
                let from: Square = from.parse()?;
                let to: Square = to.parse()?;
                if self.pending == Some((from, to)) {
                    self.pending = None;
                } else {
                    // Show the opponent's move now; the snapshot corrects
                    // anything this simple move cannot express.
                    self.board.move_optimistic(from, to);
                }
                Ok(Vec::new())
            }
            ServerMessage::MoveRejected { from, to, .. } => {
                let from: Square = from.parse()?;
                let to: Square = to.parse()?;
                if self.pending == Some((from, to)) {
                    self.pending = None;
                    return Ok(self.board.rollback());
                }
                Ok(Vec::new())
            }
            ServerMessage::Snapshot { fen } => {
                self.pending = None;
                self.reconcile(fen)
            }
            ServerMessage::OutcomeChanged {
                outcome, message, ..
            } => {
                self.outcome = MatchOutcome::from_code(*outcome).unwrap_or_default();
                self.message = message.clone();
                Ok(Vec::new())
            }
            ServerMessage::MatchReset { .. } => {
                self.outcome = MatchOutcome::None;
                self.message.clear();
                self.turn.reset();
                self.pending = None;
                Ok(Vec::new())
            }
            ServerMessage::PositionSaved { .. } | ServerMessage::Error { .. } => Ok(Vec::new()),
        }
    }

    fn reconcile(&mut self, fen: &str) -> Result<Vec<SquareRepair>, RulesError> {
        let snapshot = BoardSnapshot::parse(fen)?;
        self.board.reconcile(&snapshot)
    }
}
