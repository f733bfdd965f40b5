// Sliding-window rate limiter keyed by client id

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::audit::AuditLog;
use crate::config::RateLimitSettings;

/// Admission decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub allowed: bool,
    /// Requests left in the current window after this one
    pub remaining: usize,
}

/// Per-client sliding-window limiter.
///
/// Each client's timestamps live in their own DashMap entry, so checks for
/// different clients do not serialize on one lock. Expired timestamps are
/// dropped when that client is checked again. Entries of idle clients are
/// swept lazily at most once per window; there is no background task.
pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    window: Duration,
    audit: Option<Arc<AuditLog>>,
    last_sweep: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
            audit: None,
            last_sweep: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.max_requests, settings.window())
    }

    /// Append rejections to `audit`
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `client_id` may make a request now
    pub fn allow(&self, client_id: &str) -> Admission {
        self.allow_at(client_id, Instant::now())
    }

    /// Decide at an explicit instant
    pub fn allow_at(&self, client_id: &str, now: Instant) -> Admission {
        let admission = {
            let mut timestamps = self.requests.entry(client_id.to_string()).or_default();

            // Before the first full window has elapsed nothing can be expired
            if let Some(cutoff) = now.checked_sub(self.window) {
                timestamps.retain(|ts| *ts > cutoff);
            }

            if timestamps.len() >= self.max_requests {
                Admission {
                    allowed: false,
                    remaining: 0,
                }
            } else {
                let remaining = self.max_requests - timestamps.len() - 1;
                timestamps.push(now);
                Admission {
                    allowed: true,
                    remaining,
                }
            }
        };

        self.sweep_idle_clients(now);

        if !admission.allowed {
            let details = format!(
                "Client exceeded {} requests in {}s",
                self.max_requests,
                self.window.as_secs()
            );
            match &self.audit {
                Some(audit) => audit.record("rate_limit_exceeded", details, client_id),
                None => tracing::warn!(client = %client_id, "{}", details),
            }
        }

        admission
    }

    /// Number of clients with an entry
    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }

    /// Drop clients whose newest timestamp has left the window.
    ///
    /// Must not be called while an entry guard is held.
    fn sweep_idle_clients(&self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };

        {
            let mut last_sweep = self
                .last_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *last_sweep {
                Some(last) if now.saturating_duration_since(last) < self.window => return,
                _ => *last_sweep = Some(now),
            }
        }

        let before = self.requests.len();
        self.requests
            .retain(|_, timestamps| timestamps.last().is_some_and(|ts| *ts > cutoff));

        let removed = before.saturating_sub(self.requests.len());
        if removed > 0 {
            tracing::debug!(removed, "Swept idle rate limit entries");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}
