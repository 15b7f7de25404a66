//! Match socket message types, shared by server and participants.
//!
//! Squares travel as algebraic strings, the board as a FEN string, the
//! outcome as its numeric code and the turn as a plain integer.

use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Participant → server messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move { from: String, to: String },
    Resign,
    NewMatch,
    SavePosition,
    LoadPosition,
}

/// Server → participant messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        participant: u64,
        side: Option<Side>,
        turn: u32,
        side_to_move: Side,
        outcome: u8,
        message: String,
        fen: String,
    },
    SideAssigned {
        side: Option<Side>,
    },
    TurnChanged {
        side_to_move: Side,
        turn: u32,
    },
    MoveApplied {
        from: String,
        to: String,
    },
    /// Sent only to the participant whose move was refused.
    MoveRejected {
        from: String,
        to: String,
        reason: String,
    },
    Snapshot {
        fen: String,
    },
    OutcomeChanged {
        previous: u8,
        outcome: u8,
        message: String,
    },
    MatchReset {
        generation: u64,
    },
    PositionSaved {
        fen: String,
        turn: u32,
    },
    Error {
        message: String,
    },
}
