// metrics.json persistence: the exported document is exactly a snapshot

use std::fs;
use std::path::Path;

use super::types::MetricsSnapshot;
use crate::errors::{Result, TelemetryError};

/// Write `snapshot` to `path` as pretty JSON, replacing any previous export
pub fn export_snapshot(path: &Path, snapshot: &MetricsSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TelemetryError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_vec_pretty(snapshot)?;
    fs::write(path, json).map_err(|source| TelemetryError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Metrics exported");
    Ok(())
}

/// Read a previously exported snapshot
pub fn load_snapshot(path: &Path) -> Result<MetricsSnapshot> {
    let contents = fs::read(path).map_err(|source| TelemetryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsAggregator, NoopProbe, RequestEvent};
    use std::sync::Arc;

    #[test]
    fn test_export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("metrics.json");

        let metrics = MetricsAggregator::new(Arc::new(NoopProbe));
        metrics.record(&RequestEvent::succeeded(0.25, ["search_products"], "milk"));
        let snapshot = metrics.snapshot();

        export_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_export_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = MetricsAggregator::new(Arc::new(NoopProbe));

        export_snapshot(&path, &metrics.snapshot()).unwrap();
        metrics.record(&RequestEvent::succeeded(1.0, ["a"], "q"));
        export_snapshot(&path, &metrics.snapshot()).unwrap();

        assert_eq!(load_snapshot(&path).unwrap().total_requests, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TelemetryError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        fs::write(&path, b"{\"total_requests\": \"many\"}").unwrap();
        assert!(matches!(
            load_snapshot(&path).unwrap_err(),
            TelemetryError::Serialization(_)
        ));
    }
}
