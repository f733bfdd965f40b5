// Error types and user-friendly error messages
//
// Library code returns `TelemetryError`; the binary and HTTP layer wrap it
// in anyhow and use the helpers below to turn common failures into
// actionable messages.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the telemetry subsystem
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("resource sampling unavailable: {0}")]
    Sampling(String),

    #[error("metrics exposition failed: {0}")]
    Exposition(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Format an address-in-use error with helpful suggestions
pub fn address_in_use_error(address: &str) -> String {
    format!(
        "Could not bind telemetry server to {}\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • Another agent-telemetry instance is already running\n\
        • Another service is using the port\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Pick another address:\n\
           \x1b[36magent-telemetry serve --bind 127.0.0.1:5002\x1b[0m\n\n\
        2. Find the process holding the port:\n\
           \x1b[36mlsof -i :{}\x1b[0m",
        address,
        address.rsplit(':').next().unwrap_or(address)
    )
}

/// Format a config parse error with helpful suggestions
pub fn config_parse_error(path: &str, error: &str) -> String {
    format!(
        "Failed to parse config file {}\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat {}\x1b[0m\n\n\
        2. Print the effective defaults:\n\
           \x1b[36magent-telemetry config\x1b[0m",
        path, error, path
    )
}

/// Format a missing export file error with helpful suggestions
pub fn export_not_found_error(path: &str) -> String {
    format!(
        "Metrics export not found: {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Export from a running server:\n\
           \x1b[36mcurl http://127.0.0.1:5001/metrics/export\x1b[0m\n\n\
        2. Point at another file:\n\
           \x1b[36magent-telemetry report --input path/to/metrics.json\x1b[0m",
        path
    )
}
