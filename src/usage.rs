//! Append-only usage log.
//!
//! One immutable record per guarded request, written whether the request
//! was admitted or blocked. The log exists for audits and reporting only;
//! the rate-limit decision never reads it.

use crate::actor::{Actor, ActorKind};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Mutex;

/// One guarded request, as seen by the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEntry {
    /// Logical route name the guard was invoked for.
    pub endpoint: String,
    /// Kind of identity the request was attributed to.
    pub actor_kind: ActorKind,
    /// Partition key: key digest, IP string, or `"unknown"`.
    pub actor_key: String,
    /// Epoch second the attempt was recorded at.
    pub timestamp: u64,
    /// Whether the rate limiter blocked the request.
    pub blocked: bool,
}

impl UsageEntry {
    /// Build an entry from a resolved actor.
    pub fn new(endpoint: impl Into<String>, actor: &Actor, timestamp: u64, blocked: bool) -> Self {
        UsageEntry {
            endpoint: endpoint.into(),
            actor_kind: actor.kind(),
            actor_key: actor.key().to_string(),
            timestamp,
            blocked,
        }
    }
}

/// Sink for usage records. Insert-only; no update or delete.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Append one record. Errors propagate to the guard, which logs and
    /// absorbs them so a broken audit trail never blocks traffic.
    async fn record(&self, entry: UsageEntry) -> Result<(), StoreError>;
}

/// Usage log held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryUsageLog {
    entries: Mutex<Vec<UsageEntry>>,
}

impl InMemoryUsageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in write order.
    pub fn entries(&self) -> Vec<UsageEntry> {
        self.entries.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Number of records written.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsageRecorder for InMemoryUsageLog {
    async fn record(&self, entry: UsageEntry) -> Result<(), StoreError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::unavailable("usage log mutex poisoned"))?;
        guard.push(entry);
        Ok(())
    }
}
