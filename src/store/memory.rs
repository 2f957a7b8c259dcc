//! In-memory counter store on a sharded concurrent map.
//!
//! Suitable for a single-process deployment: counters live in process
//! memory, so horizontally scaled replicas each enforce their own limit.
//! Anything needing a shared view should implement [`CounterStore`] over an
//! external backend instead; the trait is the seam.

use super::{window_start, CounterStore, RateDecision};
use crate::actor::Actor;
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Composite key: one counter per (endpoint, actor).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    endpoint: String,
    actor: Actor,
}

/// One fixed-window counter row.
#[derive(Debug, Clone, Copy)]
struct Counter {
    window_start: u64,
    /// Admitted and over-limit attempts in this window. Kept counting past
    /// the ceiling so the audit trail shows attempt volume.
    count: u32,
}

/// Counter store backed by a [`DashMap`].
///
/// The per-entry lock serializes the read-increment-write for each key, so
/// concurrent requests for the same (endpoint, actor) cannot lose updates.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<CounterKey, Counter>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counter rows, expired or not.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop counters whose window started at or before `cutoff`, returning
    /// how many were removed.
    ///
    /// Purely operational hygiene: an expired counter is reset on its next
    /// `consume` anyway, this just bounds memory for one-shot actors.
    pub fn sweep_stale_before(&self, cutoff: u64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.window_start > cutoff);
        before - self.counters.len()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn consume(
        &self,
        endpoint: &str,
        actor: &Actor,
        window_secs: u64,
        max_requests: u32,
        now: u64,
    ) -> Result<RateDecision, StoreError> {
        let window_secs = window_secs.max(1);
        let current_start = window_start(now, window_secs);
        let key = CounterKey { endpoint: endpoint.to_string(), actor: actor.clone() };

        // entry() holds the shard lock for the whole read-increment-write.
        let mut entry =
            self.counters.entry(key).or_insert(Counter { window_start: current_start, count: 0 });

        if now >= entry.window_start + window_secs {
            entry.window_start = current_start;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        Ok(RateDecision::from_count(entry.count, max_requests, entry.window_start, window_secs, now))
    }
}

/// Periodically sweep counters older than `window_secs` off `store`.
///
/// Aborting the returned handle stops the sweep.
pub fn spawn_sweeper(
    store: Arc<InMemoryCounterStore>,
    window_secs: u64,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let cutoff = SystemClock.epoch_secs().saturating_sub(window_secs);
            let swept = store.sweep_stale_before(cutoff);
            if swept > 0 {
                tracing::debug!(swept, "swept expired rate limit counters");
            }
        }
    })
}
