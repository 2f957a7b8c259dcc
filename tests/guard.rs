use api_guard::{
    Actor, ActorKind, ApiGuard, CounterStore, InMemoryCounterStore, InMemoryUsageLog,
    LimitDefaults, LimitOptions, ManualClock, RateDecision, StoreError, UsageEntry, UsageRecorder,
};
use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use std::net::IpAddr;
use std::sync::Arc;

// An epoch second on a 60s boundary, so retry-after reads a full window.
const T0: u64 = 1_755_000_000;

fn guard_with_clock(
    clock: &ManualClock,
) -> (ApiGuard<InMemoryCounterStore, InMemoryUsageLog>, Arc<InMemoryUsageLog>) {
    let usage = Arc::new(InMemoryUsageLog::new());
    let guard = ApiGuard::new(Arc::new(InMemoryCounterStore::new()), usage.clone())
        .with_clock(Arc::new(clock.clone()))
        .with_defaults(LimitDefaults::default());
    (guard, usage)
}

fn forwarded_for(addr: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", addr.parse().unwrap());
    headers
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn admits_then_blocks_then_recovers_after_rollover() {
    let clock = ManualClock::new(T0);
    let (guard, usage) = guard_with_clock(&clock);
    let headers = forwarded_for("1.2.3.4");
    let opts = LimitOptions::new().window_secs(60).max_requests(3);

    // Calls 1..=3 within the window are allowed.
    for _ in 0..3 {
        let outcome = guard.check("/api/keyword-research", &headers, None, &opts).await;
        assert!(outcome.is_none());
    }

    // Call 4 is blocked with the full contract body.
    let blocked = guard
        .check("/api/keyword-research", &headers, None, &opts)
        .await
        .expect("fourth call should be blocked");
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 =
        blocked.headers()["Retry-After"].to_str().unwrap().parse().unwrap();
    assert!(retry_after >= 1 && retry_after <= 60);
    assert_eq!(blocked.headers()["X-RateLimit-Remaining"], "0");
    assert_eq!(blocked.headers()["X-RateLimit-Limit"], "3");
    assert_eq!(
        blocked.headers()["X-RateLimit-Reset"].to_str().unwrap(),
        (T0 + 60).to_string()
    );

    let json = body_json(blocked).await;
    assert_eq!(json["error"], "Rate limit exceeded");
    assert_eq!(json["endpoint"], "/api/keyword-research");
    assert_eq!(json["limit"], 3);
    assert!(json["retryAfterSeconds"].as_u64().unwrap() <= 60);

    // Past the boundary the actor gets a fresh window.
    clock.advance(61);
    let outcome = guard.check("/api/keyword-research", &headers, None, &opts).await;
    assert!(outcome.is_none());

    // One usage row per guarded call, blocked flag mirroring each decision.
    let entries = usage.entries();
    assert_eq!(entries.len(), 5);
    let blocked_flags: Vec<bool> = entries.iter().map(|e| e.blocked).collect();
    assert_eq!(blocked_flags, vec![false, false, false, true, false]);
    assert!(entries.iter().all(|e| e.actor_kind == ActorKind::Ip));
    assert!(entries.iter().all(|e| e.actor_key == "1.2.3.4"));
}

#[tokio::test]
async fn endpoints_and_actors_do_not_share_counters() {
    let clock = ManualClock::new(T0);
    let (guard, _) = guard_with_clock(&clock);
    let opts = LimitOptions::new().max_requests(1);

    let a = forwarded_for("1.1.1.1");
    let b = forwarded_for("2.2.2.2");

    assert!(guard.check("/api/x", &a, None, &opts).await.is_none());
    // Same actor on /api/x is now exhausted...
    assert!(guard.check("/api/x", &a, None, &opts).await.is_some());
    // ...but other composite keys are untouched.
    assert!(guard.check("/api/y", &a, None, &opts).await.is_none());
    assert!(guard.check("/api/x", &b, None, &opts).await.is_none());
}

#[tokio::test]
async fn api_key_header_wins_and_is_stored_hashed() {
    let clock = ManualClock::new(T0);
    let (guard, usage) = guard_with_clock(&clock);

    let mut headers = forwarded_for("1.2.3.4");
    headers.insert("x-api-key", "test-key-123".parse().unwrap());

    guard.check("/api/x", &headers, None, &LimitOptions::new()).await;

    let entries = usage.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_kind, ActorKind::ApiKey);
    assert_eq!(
        entries[0].actor_key,
        "625faa3fbbc3d2bd9d6ee7678d04cc5339cb33dc68d9b58451853d60046e226a"
    );
}

#[tokio::test]
async fn explicit_endpoint_option_overrides_request_path() {
    let clock = ManualClock::new(T0);
    let (guard, usage) = guard_with_clock(&clock);
    let opts = LimitOptions::new().endpoint("/api/keyword-research").max_requests(1);
    let headers = forwarded_for("1.2.3.4");

    guard.check("/some/raw/path", &headers, None, &opts).await;
    let blocked = guard.check("/some/raw/path", &headers, None, &opts).await.unwrap();

    let json = body_json(blocked).await;
    assert_eq!(json["endpoint"], "/api/keyword-research");
    assert!(usage.entries().iter().all(|e| e.endpoint == "/api/keyword-research"));
}

struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn consume(
        &self,
        _endpoint: &str,
        _actor: &Actor,
        _window_secs: u64,
        _max_requests: u32,
        _now: u64,
    ) -> Result<RateDecision, StoreError> {
        Err(StoreError::unavailable("backend down"))
    }
}

#[tokio::test]
async fn storage_failure_fails_open() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let usage = Arc::new(InMemoryUsageLog::new());
    let guard = ApiGuard::new(Arc::new(FailingStore), usage.clone());
    let headers = forwarded_for("1.2.3.4");

    // Every call proceeds; the limiter fault never reaches the caller.
    for _ in 0..50 {
        let outcome = guard.check("/api/x", &headers, None, &LimitOptions::new()).await;
        assert!(outcome.is_none());
    }
    // No decision was made, so nothing was logged either.
    assert!(usage.is_empty());
}

struct FailingRecorder;

#[async_trait]
impl UsageRecorder for FailingRecorder {
    async fn record(&self, _entry: UsageEntry) -> Result<(), StoreError> {
        Err(StoreError::unavailable("log full"))
    }
}

#[tokio::test]
async fn usage_log_failure_never_blocks_traffic() {
    let clock = ManualClock::new(T0);
    let guard = ApiGuard::new(Arc::new(InMemoryCounterStore::new()), Arc::new(FailingRecorder))
        .with_clock(Arc::new(clock))
        .with_defaults(LimitDefaults::default());
    let headers = forwarded_for("1.2.3.4");
    let opts = LimitOptions::new().max_requests(1);

    // Allowed request still allowed despite the failed audit write.
    assert!(guard.check("/api/x", &headers, None, &opts).await.is_none());
    // And the limit itself still enforces.
    assert!(guard.check("/api/x", &headers, None, &opts).await.is_some());
}

#[tokio::test]
async fn end_to_end_scenario_expensive_endpoint() {
    // windowSeconds=60, maxRequests=3, actor ip:1.2.3.4.
    let clock = ManualClock::new(T0);
    let (guard, _) = guard_with_clock(&clock);
    let headers = forwarded_for("1.2.3.4");
    let opts = LimitOptions::new().window_secs(60).max_requests(3);
    let peer: Option<IpAddr> = None;

    for _ in 0..3 {
        assert!(guard.check("/api/keyword-research", &headers, peer, &opts).await.is_none());
    }
    let blocked = guard.check("/api/keyword-research", &headers, peer, &opts).await.unwrap();
    let json = body_json(blocked).await;
    assert_eq!(json["retryAfterSeconds"], 60);

    clock.advance(61);
    assert!(guard.check("/api/keyword-research", &headers, peer, &opts).await.is_none());
}
