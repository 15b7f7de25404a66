//! Process-wide table of live matches.
//!
//! Lock order is always registry, then match. A match is created by its
//! first joiner and torn down when its last participant leaves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chess_core::RulesEvaluator;
use tokio::sync::{broadcast, watch, Mutex};

use super::board::PublishedSnapshot;
use super::{MatchContext, MatchSummary, ParticipantId, Welcome};
use crate::config::Config;
use crate::events::MatchEvent;
use crate::store::PositionStore;

const MAX_MATCH_ID_LEN: usize = 64;

/// A participant's live attachment to a match. Subscriptions are taken
/// before the participant is seated, so nothing emitted after the welcome
/// can be missed.
pub struct Membership {
    pub participant: ParticipantId,
    pub context: Arc<MatchContext>,
    pub events: broadcast::Receiver<MatchEvent>,
    pub snapshots: watch::Receiver<PublishedSnapshot>,
    pub welcome: Welcome,
}

pub struct MatchRegistry {
    config: Config,
    rules: Arc<dyn RulesEvaluator>,
    store: Arc<dyn PositionStore>,
    matches: Mutex<HashMap<String, Arc<MatchContext>>>,
    next_participant: AtomicU64,
}

/// Match ids appear in URLs and log lines; keep them short and plain.
pub fn validate_match_id(match_id: &str) -> Result<(), String> {
    if match_id.is_empty() || match_id.len() > MAX_MATCH_ID_LEN {
        return Err(format!("Match id must be 1-{MAX_MATCH_ID_LEN} characters"));
    }
    if !match_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Match id may only contain letters, digits, '-' and '_'".to_string());
    }
    Ok(())
}

impl MatchRegistry {
    pub fn new(config: Config, rules: Arc<dyn RulesEvaluator>, store: Arc<dyn PositionStore>) -> Self {
        Self {
            config,
            rules,
            store,
            matches: Mutex::new(HashMap::new()),
            next_participant: AtomicU64::new(0),
        }
    }

    pub fn next_participant(&self) -> ParticipantId {
        ParticipantId(self.next_participant.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Attach a fresh participant to `match_id`, creating the match if needed.
    pub async fn join(&self, match_id: &str) -> Membership {
        let participant = self.next_participant();
        let mut matches = self.matches.lock().await;
        let context = self.context_in(&mut matches, match_id);

        let events = context.subscribe();
        let snapshots = context.watch_snapshots();
        let welcome = context.join(participant).await;
        drop(matches);

        Membership {
            participant,
            context,
            events,
            snapshots,
            welcome,
        }
    }

    /// Detach a participant. Returns whether its departure reset the match.
    pub async fn leave(&self, membership: Membership) -> bool {
        let Membership {
            participant,
            context,
            events,
            snapshots,
            ..
        } = membership;
        drop(events);
        drop(snapshots);

        let reset = context.leave(participant).await;
        self.release(context.id()).await;
        reset
    }

    pub async fn get_or_create(&self, match_id: &str) -> Arc<MatchContext> {
        let mut matches = self.matches.lock().await;
        self.context_in(&mut matches, match_id)
    }

    pub async fn get(&self, match_id: &str) -> Option<Arc<MatchContext>> {
        self.matches.lock().await.get(match_id).cloned()
    }

    /// Tear the match down if nobody is left in it. Returns whether it was removed.
    pub async fn release(&self, match_id: &str) -> bool {
        let mut matches = self.matches.lock().await;
        let Some(context) = matches.get(match_id).cloned() else {
            return false;
        };
        if context.participant_count().await > 0 {
            return false;
        }
        matches.remove(match_id);
        context.shutdown().await;
        true
    }

    /// Summaries of live matches, ordered by id.
    pub async fn list(&self) -> Vec<MatchSummary> {
        let mut contexts: Vec<_> = self.matches.lock().await.values().cloned().collect();
        contexts.sort_by(|a, b| a.id().cmp(b.id()));

        let mut summaries = Vec::with_capacity(contexts.len());
        for context in contexts {
            summaries.push(context.summary().await);
        }
        summaries
    }

    fn context_in(
        &self,
        matches: &mut HashMap<String, Arc<MatchContext>>,
        match_id: &str,
    ) -> Arc<MatchContext> {
        matches
            .entry(match_id.to_string())
            .or_insert_with(|| {
                MatchContext::new(
                    match_id,
                    self.rules.clone(),
                    self.store.clone(),
                    &self.config,
                )
            })
            .clone()
    }
}
