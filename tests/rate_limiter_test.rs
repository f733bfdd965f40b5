// Integration tests for admission control

use agent_telemetry::admission::{AuditLog, RateLimiter};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_twenty_per_minute() {
    let limiter = RateLimiter::default();
    let start = Instant::now();

    let remaining: Vec<usize> = (0..20)
        .map(|i| {
            let admission = limiter.allow_at("203.0.113.9", start + Duration::from_millis(i * 100));
            assert!(admission.allowed);
            admission.remaining
        })
        .collect();
    assert_eq!(remaining, (0..20).rev().collect::<Vec<_>>());

    let rejected = limiter.allow_at("203.0.113.9", start + Duration::from_secs(5));
    assert!(!rejected.allowed);
    assert_eq!(rejected.remaining, 0);

    let after_window = limiter.allow_at("203.0.113.9", start + Duration::from_secs(62));
    assert!(after_window.allowed);
}

#[test]
fn test_concurrent_same_client_admits_exactly_max() {
    let limiter = Arc::new(RateLimiter::new(20, Duration::from_secs(60)));
    let now = Instant::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                (0..10)
                    .filter_map(|_| {
                        let admission = limiter.allow_at("shared", now);
                        admission.allowed.then_some(admission.remaining)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let admitted: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(admitted.len(), 20);

    // Each remaining value is handed out exactly once
    let distinct: HashSet<usize> = admitted.iter().copied().collect();
    assert_eq!(distinct.len(), 20);
}

#[test]
fn test_rejections_reach_audit_log() {
    let audit = Arc::new(AuditLog::new());
    let limiter = RateLimiter::new(3, Duration::from_secs(60)).with_audit(Arc::clone(&audit));
    let now = Instant::now();

    for _ in 0..5 {
        limiter.allow_at("2001:db8:1:2:3:4:5:6", now);
    }

    assert_eq!(audit.total(), 2);
    let events = audit.recent(100);
    assert!(events.iter().all(|e| e.client == "2001:db8:1:2:****"));
    assert!(events[0].details.contains("3 requests in 60s"));
}
