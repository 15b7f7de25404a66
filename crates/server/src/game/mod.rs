//! Per-match authority.
//!
//! A [`MatchContext`] owns every piece of canonical state for one match:
//! the turn authority, the board, and the outcome machine. All of it sits
//! behind a single async mutex, so each command validates, evaluates and
//! commits against state no other command can see half-finished.

pub mod board;
pub mod lifecycle;
pub mod registry;
pub mod turn;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chess_core::protocol::ServerMessage;
use chess_core::{AppliedMove, BoardSnapshot, MatchOutcome, RulesEvaluator, Side, Square, TurnCounter};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};

use crate::config::Config;
use crate::error::MatchError;
use crate::events::{EventBus, MatchEvent};
use crate::store::{PositionStore, SavedPosition, StoreError};
use board::{BoardAuthority, PublishedSnapshot};
use lifecycle::{ForcedOutcome, OutcomeMachine, Transition};
use turn::TurnAuthority;

/// Upper bound on a restored turn counter. The 75-move rule caps a legal
/// game well below this many plies.
const MAX_LOADED_TURN: u32 = 12_000;

/// Opaque connection identity, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a participant needs to catch up on connect or after lagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub participant: ParticipantId,
    pub side: Option<Side>,
    pub turn: u32,
    pub side_to_move: Side,
    pub outcome: MatchOutcome,
    pub snapshot: BoardSnapshot,
}

impl Welcome {
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Welcome {
            participant: self.participant.0,
            side: self.side,
            turn: self.turn,
            side_to_move: self.side_to_move,
            outcome: self.outcome.code(),
            message: self.outcome.message().to_string(),
            fen: self.snapshot.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub id: String,
    pub generation: u64,
    pub turn: u32,
    pub side_to_move: Side,
    pub outcome: u8,
    pub message: String,
    pub fen: String,
    pub white: Option<ParticipantId>,
    pub black: Option<ParticipantId>,
    pub participants: Vec<ParticipantId>,
}

struct MatchState {
    generation: u64,
    /// Connected participants in join order.
    participants: Vec<ParticipantId>,
    turns: TurnAuthority,
    board: BoardAuthority,
    lifecycle: OutcomeMachine,
}

pub struct MatchContext {
    id: String,
    rules: Arc<dyn RulesEvaluator>,
    store: Arc<dyn PositionStore>,
    settle_delay: Duration,
    allow_force_outcome: bool,
    bus: EventBus,
    snapshots: watch::Sender<PublishedSnapshot>,
    state: Mutex<MatchState>,
}

impl MatchContext {
    pub fn new(
        id: impl Into<String>,
        rules: Arc<dyn RulesEvaluator>,
        store: Arc<dyn PositionStore>,
        config: &Config,
    ) -> Arc<Self> {
        let id = id.into();
        let initial = BoardSnapshot::initial();
        // Initial publication, so a joiner always has a snapshot to read.
        let (snapshots, _) = watch::channel(PublishedSnapshot {
            generation: 0,
            turn: 0,
            snapshot: initial.clone(),
        });
        tracing::info!(match_id = %id, generation = 0, "match_start");

        Arc::new(Self {
            id,
            rules,
            store,
            settle_delay: config.settle_delay,
            allow_force_outcome: config.allow_force_outcome,
            bus: EventBus::new(config.event_buffer),
            snapshots,
            state: Mutex::new(MatchState {
                generation: 0,
                participants: Vec::new(),
                turns: TurnAuthority::default(),
                board: BoardAuthority::new(initial),
                lifecycle: OutcomeMachine::default(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.bus.subscribe()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<PublishedSnapshot> {
        self.snapshots.subscribe()
    }

    // ---- Connection lifecycle ----

    /// Register a participant and seat it if a side is free.
    pub async fn join(&self, participant: ParticipantId) -> Welcome {
        let mut state = self.state.lock().await;
        if !state.participants.contains(&participant) {
            state.participants.push(participant);
        }

        let side = match state.turns.assign_side(participant) {
            Ok(side) => side,
            Err(e) => {
                tracing::error!(match_id = %self.id, %participant, "refusing side assignment: {e}");
                None
            }
        };
        self.bus.publish(MatchEvent::SideAssigned { participant, side });
        tracing::info!(
            match_id = %self.id,
            %participant,
            side = ?side,
            outcome = ?state.lifecycle.outcome(),
            "participant joined"
        );

        self.welcome_locked(&state, participant)
    }

    /// Drop a participant. Losing a seated player mid-match ends the match
    /// and starts a fresh one; returns whether that happened.
    pub async fn leave(&self, participant: ParticipantId) -> bool {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.participants.retain(|p| *p != participant);
        let released = state.board.release_for(participant);
        let side = state.turns.side_of(participant);
        tracing::info!(
            match_id = %self.id,
            %participant,
            side = ?side,
            released_publications = released,
            "participant left"
        );

        if side.is_none() || !state.lifecycle.is_live() {
            // Committed moves still get their snapshot out.
            if released > 0 {
                let generation = state.generation;
                state
                    .board
                    .publish(&self.snapshots, generation, state.turns.turn());
            }
            return false;
        }

        if let Some(transition) = state.lifecycle.disconnect() {
            self.announce(transition);
        }
        tracing::warn!(match_id = %self.id, %participant, "seated player disconnected, resetting match");
        self.reset_locked(state, BoardSnapshot::initial(), TurnCounter::default());
        true
    }

    // ---- Commands ----

    /// Validate, evaluate and commit one move.
    ///
    /// Nothing is changed or broadcast on error; the caller decides how to
    /// acknowledge the rejection to the submitter.
    pub async fn submit_move(
        self: &Arc<Self>,
        participant: ParticipantId,
        from: &str,
        to: &str,
    ) -> Result<AppliedMove, MatchError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if !state.lifecycle.is_live() {
            return Err(MatchError::MatchOver);
        }
        let from: Square = from
            .parse()
            .map_err(|_| MatchError::InvalidSquare(from.to_string()))?;
        let to: Square = to
            .parse()
            .map_err(|_| MatchError::InvalidSquare(to.to_string()))?;
        let side = state.turns.authorize(participant)?;

        let applied = self
            .rules
            .try_apply_move(state.board.current(), from, to)
            .map_err(|e| MatchError::IllegalMove(e.to_string()))?;
        if applied.mover != side {
            // Board and counter disagree on whose move it is.
            tracing::error!(
                match_id = %self.id,
                board_side = %applied.mover,
                counter_side = %side,
                "side-to-move mismatch, refusing move"
            );
            return Err(MatchError::IllegalMove(format!("{from}{to}")));
        }

        let side_to_move = state.turns.advance();
        let turn = state.turns.turn();
        state.board.commit(applied.snapshot.clone());

        self.bus.publish(MatchEvent::MoveApplied {
            from,
            to,
            mover: side,
        });
        self.bus.publish(MatchEvent::TurnChanged { side_to_move, turn });
        if let Some(transition) = state.lifecycle.observe_move(&applied) {
            self.announce(transition);
        }
        tracing::info!(match_id = %self.id, %participant, mv = %format!("{from}{to}"), turn, "move accepted");

        self.schedule_publication(state, participant);
        Ok(applied)
    }

    /// Resign for whichever side `participant` holds. Returns whether the
    /// outcome changed; unseated participants and finished matches are ignored.
    pub async fn resign(&self, participant: ParticipantId) -> bool {
        let mut state = self.state.lock().await;
        let Some(side) = state.turns.side_of(participant) else {
            tracing::debug!(match_id = %self.id, %participant, "resignation from unseated participant ignored");
            return false;
        };
        match state.lifecycle.resign(side) {
            Some(transition) => {
                self.announce(transition);
                true
            }
            None => {
                tracing::debug!(match_id = %self.id, %participant, "resignation after match end ignored");
                false
            }
        }
    }

    /// Start over from the initial position, whatever state the match was in.
    pub async fn new_match(&self) -> MatchSummary {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        self.reset_locked(state, BoardSnapshot::initial(), TurnCounter::default());
        self.summary_locked(state)
    }

    pub async fn force_outcome(&self, forced: ForcedOutcome) -> Result<bool, MatchError> {
        if !self.allow_force_outcome {
            return Err(MatchError::ForceOutcomeDisabled);
        }
        let mut state = self.state.lock().await;
        match state.lifecycle.force(forced) {
            Some(transition) => {
                tracing::warn!(match_id = %self.id, ?forced, "outcome forced");
                self.announce(transition);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn save_position(&self) -> Result<SavedPosition, MatchError> {
        let saved = {
            let state = self.state.lock().await;
            SavedPosition {
                fen: state.board.current().as_str().to_string(),
                turn: state.turns.turn(),
                saved_at: Utc::now(),
            }
        };

        // Store writes may touch disk; keep them off the match lock and the
        // runtime workers.
        let store = self.store.clone();
        let match_id = self.id.clone();
        let record = saved.clone();
        tokio::task::spawn_blocking(move || store.save(&match_id, record))
            .await
            .map_err(StoreError::from)??;
        self.bus.publish(MatchEvent::PositionSaved {
            fen: saved.fen.clone(),
            turn: saved.turn,
        });
        tracing::info!(match_id = %self.id, turn = saved.turn, "position saved");
        Ok(saved)
    }

    /// Start a new match generation from the stored position.
    pub async fn load_position(&self) -> Result<MatchSummary, MatchError> {
        let saved = self.store.load(&self.id)?.ok_or(MatchError::NoSavedPosition)?;
        let position = self
            .rules
            .deserialize(&saved.fen)
            .map_err(|e| MatchError::CorruptSavedPosition(e.to_string()))?;
        let snapshot = self.rules.serialize(&position);
        if saved.turn > MAX_LOADED_TURN {
            return Err(MatchError::CorruptSavedPosition(format!(
                "turn {} is beyond any reachable game",
                saved.turn
            )));
        }
        let counter = TurnCounter::new(saved.turn);
        let board_side = snapshot
            .side_to_move()
            .map_err(|e| MatchError::CorruptSavedPosition(e.to_string()))?;
        if board_side != counter.side_to_move() {
            return Err(MatchError::CorruptSavedPosition(format!(
                "turn {} does not match {} to move",
                saved.turn, board_side
            )));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        self.reset_locked(state, snapshot, counter);
        tracing::info!(match_id = %self.id, turn = saved.turn, "position loaded");
        Ok(self.summary_locked(state))
    }

    // ---- Queries ----

    pub async fn side_of(&self, participant: ParticipantId) -> Option<Side> {
        self.state.lock().await.turns.side_of(participant)
    }

    pub async fn outcome(&self) -> MatchOutcome {
        self.state.lock().await.lifecycle.outcome()
    }

    pub async fn welcome(&self, participant: ParticipantId) -> Welcome {
        let state = self.state.lock().await;
        self.welcome_locked(&state, participant)
    }

    pub async fn summary(&self) -> MatchSummary {
        let state = self.state.lock().await;
        self.summary_locked(&state)
    }

    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.participants.len()
    }

    pub async fn pending_publications(&self) -> usize {
        self.state.lock().await.board.pending_count()
    }

    /// Cancel outstanding scheduled work before the context is dropped.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.board.abort_all();
        tracing::info!(match_id = %self.id, generation = state.generation, "match torn down");
    }

    // ---- Internals (caller holds the state lock) ----

    fn announce(&self, transition: Transition) {
        self.bus.publish(MatchEvent::OutcomeChanged {
            previous: transition.previous,
            current: transition.current,
        });
        if transition.current.is_terminal() {
            tracing::info!(
                match_id = %self.id,
                outcome = ?transition.current,
                code = transition.current.code(),
                message = transition.current.message(),
                "match_end"
            );
        }
    }

    fn reset_locked(&self, state: &mut MatchState, snapshot: BoardSnapshot, counter: TurnCounter) {
        state.generation += 1;
        let generation = state.generation;
        state.board.abort_all();

        if let Some(transition) = state.lifecycle.reset() {
            self.announce(transition);
        }
        let seats = state.turns.reset(counter, &state.participants);
        state.board.commit(snapshot);

        self.bus.publish(MatchEvent::MatchReset { generation });
        for (participant, side) in seats {
            self.bus.publish(MatchEvent::SideAssigned { participant, side });
        }
        self.bus.publish(MatchEvent::TurnChanged {
            side_to_move: state.turns.side_to_move(),
            turn: state.turns.turn(),
        });
        state.board.publish(&self.snapshots, generation, state.turns.turn());

        tracing::info!(match_id = %self.id, generation, turn = state.turns.turn(), "match_start");
    }

    fn schedule_publication(self: &Arc<Self>, state: &mut MatchState, mover: ParticipantId) {
        let context: Weak<Self> = Arc::downgrade(self);
        let generation = state.generation;
        let delay = self.settle_delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(context) = context.upgrade() {
                context.publish_if_current(generation).await;
            }
        });
        state.board.track(mover, task.abort_handle());
    }

    async fn publish_if_current(&self, generation: u64) {
        let state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(match_id = %self.id, generation, "dropping publication from earlier match");
            return;
        }
        state
            .board
            .publish(&self.snapshots, generation, state.turns.turn());
    }

    fn welcome_locked(&self, state: &MatchState, participant: ParticipantId) -> Welcome {
        Welcome {
            participant,
            side: state.turns.side_of(participant),
            turn: state.turns.turn(),
            side_to_move: state.turns.side_to_move(),
            outcome: state.lifecycle.outcome(),
            snapshot: state.board.current().clone(),
        }
    }

    fn summary_locked(&self, state: &MatchState) -> MatchSummary {
        let outcome = state.lifecycle.outcome();
        MatchSummary {
            id: self.id.clone(),
            generation: state.generation,
            turn: state.turns.turn(),
            side_to_move: state.turns.side_to_move(),
            outcome: outcome.code(),
            message: outcome.message().to_string(),
            fen: state.board.current().as_str().to_string(),
            white: state.turns.holder(Side::White),
            black: state.turns.holder(Side::Black),
            participants: state.participants.clone(),
        }
    }
}
