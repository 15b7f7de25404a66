//! Server half of board reconciliation: the canonical snapshot and its
//! publication to participants.

use chess_core::BoardSnapshot;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::ParticipantId;

/// Latest value on the replicated snapshot channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    pub generation: u64,
    pub turn: u32,
    pub snapshot: BoardSnapshot,
}

#[derive(Debug)]
struct PendingPublication {
    mover: ParticipantId,
    handle: AbortHandle,
}

#[derive(Debug)]
pub struct BoardAuthority {
    current: BoardSnapshot,
    pending: Vec<PendingPublication>,
}

impl BoardAuthority {
    pub fn new(snapshot: BoardSnapshot) -> Self {
        Self {
            current: snapshot,
            pending: Vec::new(),
        }
    }

    pub fn current(&self) -> &BoardSnapshot {
        &self.current
    }

    /// Replace the canonical snapshot. Publication happens separately.
    pub fn commit(&mut self, snapshot: BoardSnapshot) {
        self.current = snapshot;
    }

    /// Remember a scheduled publication caused by `mover`.
    pub fn track(&mut self, mover: ParticipantId, handle: AbortHandle) {
        self.pending.retain(|p| !p.handle.is_finished());
        self.pending.push(PendingPublication { mover, handle });
    }

    /// Abort publications scheduled on behalf of `participant`.
    pub fn release_for(&mut self, participant: ParticipantId) -> usize {
        let mut released = 0;
        self.pending.retain(|p| {
            if p.mover == participant {
                p.handle.abort();
                released += 1;
                false
            } else {
                true
            }
        });
        released
    }

    pub fn abort_all(&mut self) {
        for p in self.pending.drain(..) {
            p.handle.abort();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.handle.is_finished()).count()
    }

    /// Push the canonical snapshot to the channel if it is not already there.
    pub fn publish(
        &self,
        channel: &watch::Sender<PublishedSnapshot>,
        generation: u64,
        turn: u32,
    ) -> bool {
        channel.send_if_modified(|published| {
            if published.generation == generation
                && published.turn == turn
                && published.snapshot == self.current
            {
                return false;
            }
            *published = PublishedSnapshot {
                generation,
                turn,
                snapshot: self.current.clone(),
            };
            true
        })
    }
}

impl Drop for BoardAuthority {
    fn drop(&mut self) {
        self.abort_all();
    }
}
