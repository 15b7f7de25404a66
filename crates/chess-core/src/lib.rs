//! Shared chess types for the duel server and its participants.
//!
//! Everything here is transport-agnostic: squares, sides, outcomes, the
//! canonical board snapshot, the rules evaluator seam, the wire protocol and
//! the participant-side reconciliation logic.

pub mod protocol;
pub mod reconcile;
pub mod replica;
pub mod rules;
pub mod snapshot;
pub mod square;
pub mod types;

pub use reconcile::{LocalBoard, SquareRepair};
pub use replica::Replica;
pub use rules::{AppliedMove, RulesError, RulesEvaluator, ShakmatyRules};
pub use snapshot::BoardSnapshot;
pub use square::Square;
pub use types::{MatchOutcome, Side, TurnCounter};
