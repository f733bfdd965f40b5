// Admission control
// Per-client rate limiting in front of the agent call, plus the audit trail
// of rejected requests

mod audit;
mod rate_limiter;

pub use audit::{anonymize_client, AuditEvent, AuditLog, AUDIT_CAPACITY};
pub use rate_limiter::{Admission, RateLimiter};
