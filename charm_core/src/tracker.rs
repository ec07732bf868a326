//! Session owner for progression state.
//!
//! The tracker is the only writer of a session's [`ProgressionState`]. It
//! applies the pure rules from [`crate::progression`], then writes the local
//! cache and queues a sync event. Both writes are best-effort: failures are
//! logged and the in-memory state stays authoritative.

use crate::progression::{self, ProgressionEvent, Transition};
use crate::{ProgressionState, StatsSnapshot, StatsStore, SyncEvent, SyncPayload, SyncSink};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// RNG for level-up rolls: fixed when a seed is configured, random otherwise
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

pub struct ProgressTracker<S: StatsStore, K: SyncSink> {
    state: ProgressionState,
    store: S,
    outbox: Option<K>,
    rng: ChaCha8Rng,
}

impl<S: StatsStore, K: SyncSink> ProgressTracker<S, K> {
    /// Start a session from the cached snapshot, or defaults if there is none
    ///
    /// Pass `None` for `outbox` to keep changes local.
    pub fn open(store: S, outbox: Option<K>, rng: ChaCha8Rng) -> Self {
        let state = match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => ProgressionState::default(),
            Err(e) => {
                tracing::warn!("Failed to load cached stats: {}. Using defaults.", e);
                ProgressionState::default()
            }
        };

        Self {
            state,
            store,
            outbox,
            rng,
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Award experience (e.g. a won bounty)
    pub fn add_experience(&mut self, amount: i64) -> Vec<ProgressionEvent> {
        let transition = progression::add_experience(&self.state, amount, &mut self.rng);
        self.commit(transition)
    }

    /// Record a completed task on `today`
    pub fn complete_for_day(&mut self, today: NaiveDate) -> Vec<ProgressionEvent> {
        let transition = progression::complete_for_day(&self.state, today);
        if transition.is_noop(&self.state) {
            return Vec::new();
        }
        self.commit(transition)
    }

    /// Adopt a snapshot fetched from the remote store
    ///
    /// Only the local cache is updated; the remote side already has it.
    /// A snapshot without streak fields keeps the local streak.
    pub fn replace(&mut self, snapshot: StatsSnapshot) {
        let has_streak = snapshot.has_streak();
        let mut state = ProgressionState::from(snapshot);
        if !has_streak {
            state.current_streak = self.state.current_streak;
            state.last_completed_date = self.state.last_completed_date;
        }
        self.state = state;
        if let Err(e) = self.store.save(&self.state) {
            tracing::warn!("Failed to cache refreshed stats: {}", e);
        }
    }

    fn commit(&mut self, transition: Transition) -> Vec<ProgressionEvent> {
        self.state = transition.state;

        if let Err(e) = self.store.save(&self.state) {
            tracing::warn!("Failed to cache stats: {}", e);
        }

        if let Some(outbox) = self.outbox.as_mut() {
            let event = SyncEvent::new(SyncPayload::Stats(self.state.clone().into()));
            if let Err(e) = outbox.append(&event) {
                tracing::warn!("Failed to queue stats sync: {}", e);
            }
        }

        transition.events
    }
}
