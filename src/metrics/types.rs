// Metrics data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest request text kept in an error record
pub const ERROR_REQUEST_CHARS: usize = 200;
/// Longest request text kept in an execution trace
pub const TRACE_REQUEST_CHARS: usize = 300;
/// Longest response text kept in an execution trace
pub const TRACE_RESPONSE_CHARS: usize = 500;
/// Longest query/response text kept in a consistency check
pub const CONSISTENCY_TEXT_CHARS: usize = 200;

/// A completed agent request, as reported by the request-handling layer
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    pub success: bool,
    /// Wall-clock duration of the agent call in seconds (never negative)
    pub latency_seconds: f64,
    /// Tools invoked, deduplicated in order of first use
    pub tools_used: Vec<String>,
    pub error: Option<String>,
    pub request_text: String,
}

impl RequestEvent {
    pub fn new(
        success: bool,
        latency_seconds: f64,
        tools_used: impl IntoIterator<Item = impl Into<String>>,
        error: Option<String>,
        request_text: impl Into<String>,
    ) -> Self {
        let mut tools: Vec<String> = Vec::new();
        for tool in tools_used {
            let tool = tool.into();
            if !tool.is_empty() && !tools.contains(&tool) {
                tools.push(tool);
            }
        }

        let latency_seconds = if latency_seconds.is_finite() && latency_seconds > 0.0 {
            latency_seconds
        } else {
            0.0
        };

        Self {
            success,
            latency_seconds,
            tools_used: tools,
            error,
            request_text: request_text.into(),
        }
    }

    /// Successful request
    pub fn succeeded(
        latency_seconds: f64,
        tools_used: impl IntoIterator<Item = impl Into<String>>,
        request_text: impl Into<String>,
    ) -> Self {
        Self::new(true, latency_seconds, tools_used, None, request_text)
    }

    /// Failed request with its error text
    pub fn failed(
        latency_seconds: f64,
        tools_used: impl IntoIterator<Item = impl Into<String>>,
        error: impl Into<String>,
        request_text: impl Into<String>,
    ) -> Self {
        Self::new(
            false,
            latency_seconds,
            tools_used,
            Some(error.into()),
            request_text,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyEntry {
    pub timestamp: DateTime<Utc>,
    pub latency: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub tools_used: Vec<String>,
    /// Originating request, truncated
    pub request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecord {
    pub timestamp: DateTime<Utc>,
    /// Jaccard overlap between expected and actual tools (0.0-1.0)
    pub precision: f64,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub timestamp: DateTime<Utc>,
    pub request: String,
    pub response: String,
    pub tools_used: Vec<String>,
    pub latency: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    /// Earlier checks whose query was more than 70% similar
    pub similar_previous: usize,
}

/// Consistent, read-only view of all metrics at one instant.
///
/// This is also the exact shape of the exported `metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percentage, two decimals
    pub success_rate: f64,
    /// Percentage, two decimals
    pub error_rate: f64,

    /// Seconds, three decimals
    pub avg_latency: f64,
    pub p95_latency: f64,
    pub p99_latency: f64,
    pub latency_history: Vec<LatencyEntry>,

    pub avg_precision: f64,
    pub precision_history: Vec<PrecisionRecord>,

    pub tool_usage: BTreeMap<String, u64>,
    pub total_tool_calls: u64,

    pub recent_errors: Vec<ErrorRecord>,
    /// Cumulative failures, not limited to `recent_errors`
    pub error_count: u64,

    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub resource_usage: Vec<ResourceSample>,

    pub execution_traces: Vec<ExecutionTrace>,
    /// Number of retained consistency checks
    pub consistency_checks: usize,

    pub generated_at: DateTime<Utc>,
}

/// Headline numbers for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_latency: f64,
    pub avg_precision: f64,
    pub avg_cpu: f64,
    pub avg_memory: f64,
}

impl MetricsSnapshot {
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_requests: self.total_requests,
            success_rate: self.success_rate,
            error_rate: self.error_rate,
            avg_latency: self.avg_latency,
            avg_precision: self.avg_precision,
            avg_cpu: self.avg_cpu_percent,
            avg_memory: self.avg_memory_percent,
        }
    }
}

/// Keep at most `max_chars` characters (never splits a UTF-8 sequence)
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_deduplicated_in_first_use_order() {
        let event = RequestEvent::succeeded(
            1.0,
            ["search_products", "validate_budget", "search_products", ""],
            "milk",
        );
        assert_eq!(event.tools_used, vec!["search_products", "validate_budget"]);
    }

    #[test]
    fn test_negative_latency_clamped() {
        let event = RequestEvent::failed(-0.5, Vec::<String>::new(), "boom", "q");
        assert_eq!(event.latency_seconds, 0.0);
        assert_eq!(event.error.as_deref(), Some("boom"));

        let event = RequestEvent::succeeded(f64::NAN, Vec::<String>::new(), "q");
        assert_eq!(event.latency_seconds, 0.0);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("lácteos", 2), "lá");
        assert_eq!(truncate_chars("pan", 10), "pan");
        assert_eq!(truncate_chars("", 3), "");
    }
}
