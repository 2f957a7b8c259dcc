//! Error types for the rate-limit subsystem.
//!
//! A blocked request is not an error; it is an expected [`RateDecision`]
//! outcome. Errors here mean the storage layer itself misbehaved. Stores
//! propagate them unmodified; the fail-open policy lives in the guard.
//!
//! [`RateDecision`]: crate::store::RateDecision

use thiserror::Error;

/// Failure of the counter or usage storage layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or the operation failed outright.
    #[error("rate limit store unavailable: {reason}")]
    Unavailable {
        /// Backend-specific description of the failure.
        reason: String,
    },
    /// The backend returned state that does not make sense.
    #[error("rate limit store state corrupted: {detail}")]
    Corrupted {
        /// What was wrong with the stored state.
        detail: String,
    },
}

impl StoreError {
    /// Shorthand for an [`StoreError::Unavailable`] with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable { reason: reason.into() }
    }

    /// Check whether this error means the backend was unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}
