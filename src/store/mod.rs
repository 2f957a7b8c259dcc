//! Rate limit counter storage.
//!
//! The store answers one question: is this (endpoint, actor) pair allowed
//! one more request right now, under the given window and ceiling? It uses
//! fixed-window counters: one counter row per composite key, reset at
//! epoch-aligned boundaries. Fixed windows admit up to 2x the ceiling
//! across a boundary; that imprecision is accepted in exchange for O(1)
//! state per key, and callers tuning low limits rely on it staying this way.
//!
//! Stores never fail open. A storage fault propagates as [`StoreError`] and
//! the guard decides what to do with it.

use crate::actor::Actor;
use crate::error::StoreError;
use async_trait::async_trait;

pub mod memory;

pub use memory::{spawn_sweeper, InMemoryCounterStore};

/// Outcome of consuming one request from a counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The ceiling this check was made against.
    pub limit: u32,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Seconds until the current window ends. At least 1 when blocked.
    pub retry_after_secs: u64,
    /// Epoch second at which the window resets.
    pub reset_at: u64,
}

impl RateDecision {
    /// Compute the decision for a post-increment `count` within the window
    /// starting at `window_start`. Shared by store implementations so the
    /// externally visible numbers cannot drift between backends.
    pub fn from_count(
        count: u32,
        max_requests: u32,
        window_start: u64,
        window_secs: u64,
        now: u64,
    ) -> Self {
        let allowed = count <= max_requests;
        let reset_at = window_start + window_secs;
        let until_reset = reset_at.saturating_sub(now);
        RateDecision {
            allowed,
            limit: max_requests,
            remaining: max_requests.saturating_sub(count),
            retry_after_secs: if allowed { until_reset } else { until_reset.max(1) },
            reset_at,
        }
    }
}

/// Start of the fixed window containing `now`.
pub fn window_start(now: u64, window_secs: u64) -> u64 {
    let window_secs = window_secs.max(1);
    now / window_secs * window_secs
}

/// Persistent counter store keyed by (endpoint, actor, window).
///
/// `consume` must serialize the read-increment-write for a given key: firing
/// N concurrent calls for one fresh key with ceiling M admits exactly
/// `min(N, M)`, never more. `now` is injected by the caller's clock so
/// implementations stay deterministic under test.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Record one request attempt and decide whether it is allowed.
    async fn consume(
        &self,
        endpoint: &str,
        actor: &Actor,
        window_secs: u64,
        max_requests: u32,
        now: u64,
    ) -> Result<RateDecision, StoreError>;
}
