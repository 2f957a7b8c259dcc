//! Clock abstractions used by the rate-limit window math.
//!
//! Windows are aligned to wall-clock epoch boundaries, so the clock reports
//! seconds since the Unix epoch rather than a monotonic instant. Tests drive
//! window rollover with [`ManualClock`] instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Clock abstraction so timing can be faked in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Whole seconds since the Unix epoch.
    fn epoch_secs(&self) -> u64;
}

/// Wall clock backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `epoch_secs`.
    pub fn new(epoch_secs: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(epoch_secs)) }
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, epoch_secs: u64) {
        self.now.store(epoch_secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
