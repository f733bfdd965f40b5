// Prometheus text exposition of a snapshot

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use super::types::MetricsSnapshot;
use crate::errors::Result;

/// Render counters and latency gauges in the Prometheus text format.
///
/// A fresh registry is built per call so the output always mirrors `snapshot`.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> Result<String> {
    let registry = Registry::new();

    let total = IntCounter::new("agent_requests_total", "Total number of agent requests")?;
    total.inc_by(snapshot.total_requests);
    registry.register(Box::new(total))?;

    let succeeded = IntCounter::new("agent_requests_successful_total", "Successful agent requests")?;
    succeeded.inc_by(snapshot.successful_requests);
    registry.register(Box::new(succeeded))?;

    let failed = IntCounter::new("agent_requests_failed_total", "Failed agent requests")?;
    failed.inc_by(snapshot.failed_requests);
    registry.register(Box::new(failed))?;

    let tools = IntCounterVec::new(
        Opts::new("agent_tool_calls_total", "Tool invocations by tool name"),
        &["tool"],
    )?;
    for (tool, count) in &snapshot.tool_usage {
        tools.with_label_values(&[tool.as_str()]).inc_by(*count);
    }
    registry.register(Box::new(tools))?;

    for (name, help, value) in [
        ("agent_latency_avg_seconds", "Average request latency", snapshot.avg_latency),
        ("agent_latency_p95_seconds", "95th percentile latency over retained history", snapshot.p95_latency),
        ("agent_latency_p99_seconds", "99th percentile latency over retained history", snapshot.p99_latency),
        ("agent_tool_precision_avg", "Average tool-selection precision", snapshot.avg_precision),
        ("agent_cpu_percent_avg", "Average sampled CPU usage", snapshot.avg_cpu_percent),
        ("agent_memory_percent_avg", "Average sampled memory usage", snapshot.avg_memory_percent),
    ] {
        let gauge = Gauge::new(name, help)?;
        gauge.set(value);
        registry.register(Box::new(gauge))?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
