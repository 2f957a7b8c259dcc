#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # api-guard
//!
//! Fixed-window rate limiting and usage tracking for expensive HTTP
//! endpoints (LLM calls, render jobs, scrapers). Every guarded route calls
//! one function before doing real work; the guard attributes the request to
//! an actor (hashed API key, client IP, or an "unknown" bucket), consumes
//! one slot from a persistent counter, appends an audit record, and either
//! lets the handler proceed or hands back a ready-to-send 429 with the
//! standard rate-limit headers.
//!
//! ## Design points
//!
//! - **Fixed windows, on purpose.** Counters reset at epoch-aligned
//!   boundaries; bursts of up to 2x the ceiling across a boundary are an
//!   accepted trade for O(1) state per key.
//! - **Fail open.** If the counter store errors, the request is allowed and
//!   the fault is logged. A broken limiter never turns into a 5xx.
//! - **Policy at the call site.** Each route passes its own
//!   [`LimitOptions`]; the store only implements the mechanism.
//!
//! ## Quick start
//!
//! ```rust
//! use api_guard::{ApiGuard, LimitOptions};
//! use axum::http::HeaderMap;
//!
//! #[tokio::main]
//! async fn main() {
//!     let guard = ApiGuard::in_memory();
//!     let opts = LimitOptions::new()
//!         .endpoint("/api/keyword-research")
//!         .window_secs(300)
//!         .max_requests(5);
//!
//!     let mut headers = HeaderMap::new();
//!     headers.insert("x-api-key", "my-key".parse().unwrap());
//!
//!     match guard.check("/api/keyword-research", &headers, None, &opts).await {
//!         None => { /* proceed with the expensive call */ }
//!         Some(blocked) => {
//!             // blocked is the 429 to send back
//!             assert_eq!(blocked.status(), 429);
//!         }
//!     }
//! }
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod store;
pub mod usage;

// Re-exports
pub use actor::{hash_api_key, resolve_actor, Actor, ActorKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LimitDefaults, LimitOptions, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};
pub use error::StoreError;
pub use guard::ApiGuard;
pub use middleware::{ApiGuardLayer, ApiGuardService};
pub use store::{CounterStore, InMemoryCounterStore, RateDecision};
pub use usage::{InMemoryUsageLog, UsageEntry, UsageRecorder};
