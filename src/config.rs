//! Limit configuration: process-wide defaults and per-call-site overrides.
//!
//! Resolution precedence is explicit option > environment default >
//! hardcoded default. Invalid or non-positive configured values are
//! silently corrected to the hardcoded defaults; configuration mistakes
//! must never surface as request errors.

/// Window length used when nothing else is configured.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Request ceiling used when nothing else is configured.
pub const DEFAULT_MAX_REQUESTS: u32 = 30;

/// Environment variable overriding [`DEFAULT_WINDOW_SECS`].
pub const ENV_WINDOW_SECONDS: &str = "API_GUARD_WINDOW_SECONDS";

/// Environment variable overriding [`DEFAULT_MAX_REQUESTS`].
pub const ENV_MAX_REQUESTS: &str = "API_GUARD_MAX_REQUESTS";

/// Process-wide default limits, normally read once at guard construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDefaults {
    /// Default fixed-window length in seconds.
    pub window_secs: u64,
    /// Default request ceiling per window.
    pub max_requests: u32,
}

impl Default for LimitDefaults {
    fn default() -> Self {
        LimitDefaults { window_secs: DEFAULT_WINDOW_SECS, max_requests: DEFAULT_MAX_REQUESTS }
    }
}

impl LimitDefaults {
    /// Read defaults from the environment, falling back field by field.
    pub fn from_env() -> Self {
        LimitDefaults {
            window_secs: parse_positive(std::env::var(ENV_WINDOW_SECONDS).ok())
                .unwrap_or(DEFAULT_WINDOW_SECS),
            max_requests: parse_positive(std::env::var(ENV_MAX_REQUESTS).ok())
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(DEFAULT_MAX_REQUESTS),
        }
    }
}

/// Parse a configured value, rejecting garbage and non-positive numbers.
fn parse_positive(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).filter(|&v| v > 0)
}

/// Per-call-site limit overrides.
///
/// Expensive endpoints configure much tighter ceilings than the defaults
/// (e.g. 5 requests per 300 seconds for an LLM call); the policy lives at
/// the call site, the mechanism in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitOptions {
    /// Logical route name; the guard falls back to the request path.
    pub endpoint: Option<String>,
    /// Window length override in seconds.
    pub window_secs: Option<u64>,
    /// Request ceiling override.
    pub max_requests: Option<u32>,
}

impl LimitOptions {
    /// Options with no overrides: everything comes from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the logical endpoint instead of using the request path.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Override the window length for this call site.
    pub fn window_secs(mut self, secs: u64) -> Self {
        self.window_secs = Some(secs);
        self
    }

    /// Override the request ceiling for this call site.
    pub fn max_requests(mut self, max: u32) -> Self {
        self.max_requests = Some(max);
        self
    }

    /// Resolve the effective (window, ceiling) pair against `defaults`.
    /// Zero overrides are treated as unset, same as invalid env values.
    pub fn resolve(&self, defaults: &LimitDefaults) -> (u64, u32) {
        let window = self.window_secs.filter(|&w| w > 0).unwrap_or(defaults.window_secs);
        let max = self.max_requests.filter(|&m| m > 0).unwrap_or(defaults.max_requests);
        (window, max)
    }
}
