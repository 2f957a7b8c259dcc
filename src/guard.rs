//! The guard every expensive route calls before doing real work.
//!
//! Wires identity resolution, counter consumption, and usage tracking
//! together, and turns a blocked decision into a ready-to-send 429. On a
//! storage fault it fails open: the worst the guard ever does to an
//! unrelated business request is allow it. Availability is deliberately
//! preferred over strict enforcement here.

use crate::actor::resolve_actor;
use crate::clock::{Clock, SystemClock};
use crate::config::{LimitDefaults, LimitOptions};
use crate::store::{CounterStore, InMemoryCounterStore, RateDecision};
use crate::usage::{InMemoryUsageLog, UsageEntry, UsageRecorder};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;

/// JSON body of a 429. Field names are a compatibility contract with
/// existing callers; do not rename.
#[derive(Debug, Serialize)]
struct BlockedBody<'a> {
    error: &'static str,
    endpoint: &'a str,
    limit: u32,
    #[serde(rename = "retryAfterSeconds")]
    retry_after_seconds: u64,
}

/// Rate-limit guard over a counter store and a usage log.
///
/// Constructed once at process start and shared across handlers; per-route
/// policy arrives through [`LimitOptions`] at each call site.
#[derive(Debug)]
pub struct ApiGuard<S, U> {
    store: Arc<S>,
    usage: Arc<U>,
    clock: Arc<dyn Clock>,
    defaults: LimitDefaults,
}

impl ApiGuard<InMemoryCounterStore, InMemoryUsageLog> {
    /// Guard over fresh in-memory stores, with defaults read from the
    /// environment. Good enough for a single-process deployment.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), Arc::new(InMemoryUsageLog::new()))
    }
}

impl<S, U> ApiGuard<S, U>
where
    S: CounterStore,
    U: UsageRecorder,
{
    /// Guard over the given stores, system clock, env-derived defaults.
    pub fn new(store: Arc<S>, usage: Arc<U>) -> Self {
        ApiGuard { store, usage, clock: Arc::new(SystemClock), defaults: LimitDefaults::from_env() }
    }

    /// Replace the clock. Tests drive window rollover through this.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the process-wide defaults.
    pub fn with_defaults(mut self, defaults: LimitDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// The counter store this guard consumes from.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The usage log this guard records to.
    pub fn usage(&self) -> &Arc<U> {
        &self.usage
    }

    /// Check one request. `None` means proceed; `Some` is the 429 to send.
    ///
    /// `path` is the fallback endpoint name when `opts.endpoint` is unset.
    /// `peer_ip` is the socket address the runtime saw, if any.
    pub async fn check(
        &self,
        path: &str,
        headers: &HeaderMap,
        peer_ip: Option<IpAddr>,
        opts: &LimitOptions,
    ) -> Option<Response> {
        let endpoint = opts.endpoint.as_deref().unwrap_or(path);
        let (window_secs, max_requests) = opts.resolve(&self.defaults);
        let actor = resolve_actor(headers, peer_ip);
        let now = self.clock.epoch_secs();

        let decision = match self
            .store
            .consume(endpoint, &actor, window_secs, max_requests, now)
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                // Fail open: a limiter fault must not take down the route.
                tracing::warn!(endpoint, error = %err, "rate limit store failed, allowing request");
                return None;
            }
        };

        let entry = UsageEntry::new(endpoint, &actor, now, !decision.allowed);
        if let Err(err) = self.usage.record(entry).await {
            tracing::warn!(endpoint, error = %err, "usage log write failed");
        }

        if decision.allowed {
            tracing::debug!(
                endpoint,
                actor = %actor.kind(),
                remaining = decision.remaining,
                "request admitted"
            );
            None
        } else {
            tracing::info!(
                endpoint,
                actor = %actor.kind(),
                limit = decision.limit,
                retry_after = decision.retry_after_secs,
                "request rate limited"
            );
            Some(blocked_response(endpoint, &decision))
        }
    }
}

/// Build the 429 with the standard rate-limit header quartet.
fn blocked_response(endpoint: &str, decision: &RateDecision) -> Response {
    let body = BlockedBody {
        error: "Rate limit exceeded",
        endpoint,
        limit: decision.limit,
        retry_after_seconds: decision.retry_after_secs,
    };

    let mut headers = HeaderMap::new();
    headers.insert("Retry-After", HeaderValue::from(decision.retry_after_secs));
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_at));

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}
