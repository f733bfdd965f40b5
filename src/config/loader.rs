// Configuration loader
// Loads ~/.agent-telemetry/config.toml (or an explicit path) and applies
// environment overrides

use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;
use crate::errors::{Result, TelemetryError};

pub const ENV_BIND: &str = "AGENT_TELEMETRY_BIND";
pub const ENV_EXPORT_PATH: &str = "AGENT_TELEMETRY_EXPORT_PATH";
pub const ENV_RATE_LIMIT: &str = "AGENT_TELEMETRY_RATE_LIMIT";

/// Default config location: ~/.agent-telemetry/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".agent-telemetry").join("config.toml"))
}

/// Load configuration from `path` (or the default location), falling back to
/// defaults when no file exists, then apply environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) if path.exists() => load_from_file(&path)?,
        Some(path) => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).map_err(|source| TelemetryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Apply overrides from a key lookup (the process environment in production)
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
        config.server.bind_address = bind;
    }

    if let Some(path) = lookup(ENV_EXPORT_PATH).filter(|v| !v.is_empty()) {
        config.metrics.export_path = PathBuf::from(path);
    }

    if let Some(limit) = lookup(ENV_RATE_LIMIT).filter(|v| !v.is_empty()) {
        config.rate_limit.max_requests = limit.parse().map_err(|_| {
            TelemetryError::Config(format!("{} must be a positive integer, got '{}'", ENV_RATE_LIMIT, limit))
        })?;
    }

    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.rate_limit.max_requests == 0 {
        return Err(TelemetryError::Config(
            "rate_limit.max_requests must be at least 1".to_string(),
        ));
    }
    if config.rate_limit.window_seconds == 0 {
        return Err(TelemetryError::Config(
            "rate_limit.window_seconds must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests, 20);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.metrics.export_path, PathBuf::from("data/metrics.json"));
        assert_eq!(config.metrics.cpu_sample_millis, 250);
        assert!(config.server.security_headers);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rate_limit]\nmax_requests = 5\n\n[metrics]\nreport_dir = \"/tmp/reports\""
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.metrics.report_dir, Some(PathBuf::from("/tmp/reports")));
        assert_eq!(config.server.bind_address, "127.0.0.1:5001");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit\nmax_requests = ").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_RATE_LIMIT, "3"),
            (ENV_EXPORT_PATH, "/var/lib/telemetry/metrics.json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(
            config.metrics.export_path,
            PathBuf::from("/var/lib/telemetry/metrics.json")
        );
    }

    #[test]
    fn test_bad_rate_limit_override() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == ENV_RATE_LIMIT).then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = Config::default();
        config.rate_limit.window_seconds = 0;
        assert!(validate(&config).is_err());
    }
}
