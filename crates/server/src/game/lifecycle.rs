//! End-state machine for a single match.
//!
//! `None` is the only live state. Every other outcome is terminal and can
//! only be left through `reset`, which starts the next match.

use chess_core::{AppliedMove, MatchOutcome, Side};
use serde::Deserialize;

/// Outcome change produced by a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: MatchOutcome,
    pub current: MatchOutcome,
}

/// Administrative override, only honored when enabled in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForcedOutcome {
    Checkmate { winner: Side },
    Stalemate,
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeMachine {
    outcome: MatchOutcome,
}

impl OutcomeMachine {
    pub fn outcome(&self) -> MatchOutcome {
        self.outcome
    }

    pub fn is_live(&self) -> bool {
        !self.outcome.is_terminal()
    }

    /// First writer wins; later attempts return `None` and change nothing.
    pub fn finish(&mut self, outcome: MatchOutcome) -> Option<Transition> {
        if self.outcome.is_terminal() || !outcome.is_terminal() {
            return None;
        }
        let previous = self.outcome;
        self.outcome = outcome;
        Some(Transition {
            previous,
            current: outcome,
        })
    }

    pub fn observe_move(&mut self, applied: &AppliedMove) -> Option<Transition> {
        if applied.caused_checkmate {
            self.finish(MatchOutcome::checkmate_by(applied.mover))
        } else if applied.caused_stalemate {
            self.finish(MatchOutcome::DrawByStalemate)
        } else {
            None
        }
    }

    pub fn resign(&mut self, resigner: Side) -> Option<Transition> {
        self.finish(MatchOutcome::resigned_by(resigner))
    }

    pub fn disconnect(&mut self) -> Option<Transition> {
        self.finish(MatchOutcome::ParticipantDisconnected)
    }

    pub fn force(&mut self, forced: ForcedOutcome) -> Option<Transition> {
        match forced {
            ForcedOutcome::Checkmate { winner } => self.finish(MatchOutcome::checkmate_by(winner)),
            ForcedOutcome::Stalemate => self.finish(MatchOutcome::DrawByStalemate),
        }
    }

    /// Back to `None` for a new match, whatever the previous value.
    pub fn reset(&mut self) -> Option<Transition> {
        let previous = std::mem::take(&mut self.outcome);
        previous.is_terminal().then_some(Transition {
            previous,
            current: MatchOutcome::None,
        })
    }
}
