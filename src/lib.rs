// Agent Telemetry - request telemetry and admission control
// Library exports

pub mod admission; // Per-client rate limiting and audit trail
pub mod config;
pub mod errors;
pub mod metrics; // Aggregation, reporting and export
pub mod server; // HTTP boundary
