// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration, loaded from config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub rate_limit: RateLimitSettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingSettings,
}

/// HTTP boundary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address (e.g., "127.0.0.1:5001")
    pub bind_address: String,
    /// Attach the fixed security headers to every response
    pub security_headers: bool,
    /// Gate the metrics and ingestion routes through the rate limiter
    pub rate_limit_enabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5001".to_string(),
            security_headers: true,
            rate_limit_enabled: true,
        }
    }
}

/// Sliding-window admission settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests admitted per client inside one window
    pub max_requests: usize,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Where GET /metrics/export writes the snapshot
    pub export_path: PathBuf,
    /// When set, generated reports are also written here
    pub report_dir: Option<PathBuf>,
    /// CPU sampling interval used for each recorded request; values below
    /// sysinfo's minimum CPU update interval are raised to it
    pub cpu_sample_millis: u64,
}

impl MetricsSettings {
    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_millis)
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from("data/metrics.json"),
            report_dir: None,
            cpu_sample_millis: 250,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for agent-telemetry.log (stdout only when unset)
    pub log_dir: Option<PathBuf>,
}
