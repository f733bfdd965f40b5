// Security audit log with anonymized client identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::metrics::BoundedWindow;

/// Retention limit for audit events
pub const AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    /// Anonymized client identifier
    pub client: String,
}

#[derive(Debug)]
struct AuditState {
    events: BoundedWindow<AuditEvent>,
    total: u64,
}

/// Bounded, thread-safe record of security-relevant events
#[derive(Debug)]
pub struct AuditLog {
    state: Mutex<AuditState>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(AuditState {
                events: BoundedWindow::new(capacity),
                total: 0,
            }),
        }
    }

    pub fn record(&self, kind: &str, details: impl Into<String>, client: &str) {
        let event = AuditEvent {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            details: details.into(),
            client: anonymize_client(client),
        };

        tracing::warn!(kind = %event.kind, client = %event.client, "{}", event.details);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.total += 1;
        state.events.push(event);
    }

    /// The last `n` retained events, oldest first
    pub fn recent(&self, n: usize) -> Vec<AuditEvent> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.events.tail(n)
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events recorded since startup, including evicted ones
    pub fn total(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).total
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Mask the host part of an IP-like identifier.
///
/// IPv4 keeps the first two octets, IPv6 the first four groups.
pub fn anonymize_client(client: &str) -> String {
    if client.contains(':') {
        let groups: Vec<&str> = client.split(':').take(4).collect();
        format!("{}:****", groups.join(":"))
    } else {
        let octets: Vec<&str> = client.split('.').take(2).collect();
        format!("{}.***", octets.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymize_ipv4() {
        assert_eq!(anonymize_client("192.168.10.42"), "192.168.***");
    }

    #[test]
    fn test_anonymize_ipv6() {
        assert_eq!(
            anonymize_client("2001:db8:85a3:0:0:8a2e:370:7334"),
            "2001:db8:85a3:0:****"
        );
    }

    #[test]
    fn test_anonymize_opaque_id() {
        assert_eq!(anonymize_client("unknown"), "unknown.***");
    }

    #[test]
    fn test_log_is_bounded_but_counts_everything() {
        let log = AuditLog::with_capacity(3);
        for i in 0..5 {
            log.record("rate_limit_exceeded", format!("event {}", i), "10.0.0.1");
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total(), 5);

        let recent = log.recent(2);
        assert_eq!(recent[0].details, "event 3");
        assert_eq!(recent[1].details, "event 4");
        assert_eq!(recent[1].client, "10.0.***");
    }
}
