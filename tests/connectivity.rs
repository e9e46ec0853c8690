//! End-to-end connectivity scenarios: TTL caching, forced re-checks,
//! and failure recovery against a scripted gateway.

mod common;

use common::ScriptedGateway;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use uplinkfx::connectivity::monitor::ConnectionMonitor;
use uplinkfx::error::ApiFailure;

fn monitor(gateway: Arc<ScriptedGateway>, ttl_secs: u64) -> ConnectionMonitor {
    ConnectionMonitor::new(gateway, "http://127.0.0.1:8000".into(), Duration::from_secs(ttl_secs))
}

#[tokio::test]
async fn probe_failures_inside_ttl_make_one_call_then_force_reevaluates() {
    let gw = Arc::new(ScriptedGateway::new());
    // First probe fails; the recovery probe after force succeeds.
    gw.push_probe(Err(ApiFailure::NotConnected("connection refused".into())));
    gw.push_probe(Ok(()));
    let monitor = monitor(gw.clone(), 10);

    // Three rapid unforced checks: the TTL collapses them into one
    // underlying call and the state stays disconnected.
    for _ in 0..3 {
        monitor.check(false).await;
    }
    assert_eq!(gw.probe_calls.load(Ordering::SeqCst), 1);
    let snap = monitor.snapshot();
    assert!(!snap.is_connected);
    assert!(snap.error.as_deref().unwrap_or("").contains("refused"));

    // Manual retry bypasses the TTL and re-evaluates.
    let snap = monitor.force_check().await;
    assert_eq!(gw.probe_calls.load(Ordering::SeqCst), 2);
    assert!(snap.is_connected);
    assert!(snap.error.is_none());
}

#[tokio::test]
async fn snapshot_is_read_only_and_shared() {
    let gw = Arc::new(ScriptedGateway::new());
    let monitor = Arc::new(monitor(gw.clone(), 10));
    monitor.check(false).await;

    // Any number of consumers read the same cached state without
    // triggering network traffic.
    for _ in 0..5 {
        let snap = monitor.snapshot();
        assert!(snap.is_connected);
        assert_eq!(snap.backend_url, "http://127.0.0.1:8000");
    }
    assert_eq!(gw.probe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_text_is_preserved_for_display() {
    let gw = Arc::new(ScriptedGateway::new());
    gw.push_probe(Err(ApiFailure::Unknown("HTTP 503: maintenance".into())));
    let monitor = monitor(gw, 10);
    let snap = monitor.check(false).await;
    assert!(!snap.is_connected);
    assert!(snap.error.unwrap().contains("HTTP 503"));
    assert!(snap.last_check.is_some());
}
