//! Actor identity resolution.
//!
//! Every guarded request is attributed to an [`Actor`] so limits partition
//! per caller: a caller-supplied API key (stored only as its SHA-256 digest)
//! wins over a best-effort client IP, which wins over a shared "unknown"
//! bucket. Resolution is a pure function of header values plus the optional
//! peer address; it never performs I/O and never panics.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Header carrying a caller-supplied API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proxy/CDN headers consulted for the client IP, in order, after
/// `x-forwarded-for`.
const IP_FALLBACK_HEADERS: [&str; 4] =
    ["x-real-ip", "cf-connecting-ip", "true-client-ip", "x-client-ip"];

/// Upper bound on a stored IP string. Anything longer is a hostile or
/// malformed header, not an address.
const MAX_IP_LEN: usize = 128;

/// The entity a rate limit is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    /// Caller presented an API key; payload is its SHA-256 hex digest.
    ApiKey(String),
    /// Best-effort client IP extracted from proxy headers or the socket.
    Ip(String),
    /// No usable identity; all such callers share one bucket.
    Unknown,
}

/// Discriminant of [`Actor`], used as part of store keys and audit rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    /// Hashed API key.
    ApiKey,
    /// Client IP address.
    Ip,
    /// Unattributable caller.
    Unknown,
}

impl ActorKind {
    /// Stable string form, suitable for persisted keys.
    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::ApiKey => "api_key",
            ActorKind::Ip => "ip",
            ActorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Actor {
    /// Which kind of identity this is.
    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::ApiKey(_) => ActorKind::ApiKey,
            Actor::Ip(_) => ActorKind::Ip,
            Actor::Unknown => ActorKind::Unknown,
        }
    }

    /// The partition key: key digest, IP string, or the literal `"unknown"`.
    pub fn key(&self) -> &str {
        match self {
            Actor::ApiKey(digest) => digest,
            Actor::Ip(addr) => addr,
            Actor::Unknown => "unknown",
        }
    }
}

/// SHA-256 hex digest of an API key, so raw secrets never reach the
/// counter or audit tables.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive the [`Actor`] for a request.
///
/// Priority: trimmed non-empty `x-api-key` (hashed), then the first
/// `x-forwarded-for` entry, then single-IP proxy/CDN headers, then the
/// socket peer address, else [`Actor::Unknown`]. Non-UTF-8 header values
/// are treated as absent.
pub fn resolve_actor(headers: &HeaderMap, peer_ip: Option<IpAddr>) -> Actor {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        let key = key.trim();
        if !key.is_empty() {
            return Actor::ApiKey(hash_api_key(key));
        }
    }

    if let Some(addr) = client_ip(headers, peer_ip) {
        return Actor::Ip(addr);
    }

    Actor::Unknown
}

/// Best-effort client IP: forwarded-for chain first, then single-IP
/// headers, then the peer address the runtime saw.
fn client_ip(headers: &HeaderMap, peer_ip: Option<IpAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        // First entry is the original client; the rest are proxies.
        let first = forwarded.split(',').next().unwrap_or(forwarded).trim();
        if !first.is_empty() {
            return Some(truncate_ip(first));
        }
    }

    for name in IP_FALLBACK_HEADERS {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(truncate_ip(value));
            }
        }
    }

    peer_ip.map(|ip| ip.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn truncate_ip(raw: &str) -> String {
    if raw.len() <= MAX_IP_LEN {
        raw.to_string()
    } else {
        let mut end = MAX_IP_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw[..end].to_string()
    }
}
