//! Typed per-match event bus.
//!
//! Every match context owns one bus. Subscribers hold a
//! `broadcast::Receiver`; dropping it unsubscribes, and dropping the match
//! context closes every receiver still attached.

use chess_core::protocol::ServerMessage;
use chess_core::{MatchOutcome, Side, Square};
use tokio::sync::broadcast;

use crate::game::ParticipantId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// Targeted at one participant.
    SideAssigned {
        participant: ParticipantId,
        side: Option<Side>,
    },
    TurnChanged {
        side_to_move: Side,
        turn: u32,
    },
    MoveApplied {
        from: Square,
        to: Square,
        mover: Side,
    },
    OutcomeChanged {
        previous: MatchOutcome,
        current: MatchOutcome,
    },
    MatchReset {
        generation: u64,
    },
    PositionSaved {
        fen: String,
        turn: u32,
    },
}

impl MatchEvent {
    /// Wire form of this event as seen by `recipient`, or `None` if the
    /// event is addressed to someone else.
    pub fn to_message(&self, recipient: ParticipantId) -> Option<ServerMessage> {
        let msg = match self {
            MatchEvent::SideAssigned { participant, side } => {
                if *participant != recipient {
                    return None;
                }
                ServerMessage::SideAssigned { side: *side }
            }
            MatchEvent::TurnChanged { side_to_move, turn } => ServerMessage::TurnChanged {
                side_to_move: *side_to_move,
                turn: *turn,
            },
            MatchEvent::MoveApplied { from, to, .. } => ServerMessage::MoveApplied {
                from: from.to_string(),
                to: to.to_string(),
            },
            MatchEvent::OutcomeChanged { previous, current } => ServerMessage::OutcomeChanged {
                previous: previous.code(),
                outcome: current.code(),
                message: current.message().to_string(),
            },
            MatchEvent::MatchReset { generation } => ServerMessage::MatchReset {
                generation: *generation,
            },
            MatchEvent::PositionSaved { fen, turn } => ServerMessage::PositionSaved {
                fen: fen.clone(),
                turn: *turn,
            },
        };
        Some(msg)
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.sender.subscribe()
    }

    /// Fan out to current subscribers. Having none is fine.
    pub fn publish(&self, event: MatchEvent) {
        tracing::trace!(?event, "match event");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
