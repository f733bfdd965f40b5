// Thread-safe aggregator for request outcomes, latency, tool usage and
// resource footprint

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::resources::{ResourceProbe, SystemProbe};
use super::similarity::{tool_precision, word_similarity};
use super::types::{
    truncate_chars, ConsistencyCheck, ErrorRecord, ExecutionTrace, LatencyEntry, MetricsSnapshot,
    PrecisionRecord, RequestEvent, ResourceSample, CONSISTENCY_TEXT_CHARS, ERROR_REQUEST_CHARS,
    TRACE_REQUEST_CHARS, TRACE_RESPONSE_CHARS,
};
use super::window::BoundedWindow;

pub const LATENCY_HISTORY_CAPACITY: usize = 100;
pub const PRECISION_CAPACITY: usize = 50;
pub const RESOURCE_CAPACITY: usize = 50;
pub const TRACE_CAPACITY: usize = 50;
pub const CONSISTENCY_CAPACITY: usize = 30;
/// Error details retained in memory; the error count is tracked separately
pub const ERROR_DETAIL_CAPACITY: usize = 100;

const LATENCY_DISPLAY: usize = 30;
const PRECISION_DISPLAY: usize = 20;
const ERROR_DISPLAY: usize = 10;
const RESOURCE_DISPLAY: usize = 20;
const TRACE_DISPLAY: usize = 10;

/// Queries more similar than this count as repeats
const CONSISTENCY_THRESHOLD: f64 = 0.7;

/// Everything the aggregator has measured since process start
#[derive(Debug)]
struct MetricsState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_latency: f64,
    latency_history: BoundedWindow<LatencyEntry>,
    tool_calls: HashMap<String, u64>,
    errors: BoundedWindow<ErrorRecord>,
    error_count: u64,
    precision_scores: BoundedWindow<PrecisionRecord>,
    resource_usage: BoundedWindow<ResourceSample>,
    execution_traces: BoundedWindow<ExecutionTrace>,
    consistency_checks: BoundedWindow<ConsistencyCheck>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            total_latency: 0.0,
            latency_history: BoundedWindow::new(LATENCY_HISTORY_CAPACITY),
            tool_calls: HashMap::new(),
            errors: BoundedWindow::new(ERROR_DETAIL_CAPACITY),
            error_count: 0,
            precision_scores: BoundedWindow::new(PRECISION_CAPACITY),
            resource_usage: BoundedWindow::new(RESOURCE_CAPACITY),
            execution_traces: BoundedWindow::new(TRACE_CAPACITY),
            consistency_checks: BoundedWindow::new(CONSISTENCY_CAPACITY),
        }
    }
}

/// Shared metrics store for all request-handling tasks.
///
/// Construct one per process and hand out `Arc<MetricsAggregator>` clones.
/// Every method takes the same lock for its whole critical section, so a
/// snapshot never sees counters without their matching history entry.
pub struct MetricsAggregator {
    state: Mutex<MetricsState>,
    probe: Arc<dyn ResourceProbe>,
}

impl MetricsAggregator {
    /// Create an aggregator that samples resources with `probe`
    pub fn new(probe: Arc<dyn ResourceProbe>) -> Self {
        tracing::info!("Metrics aggregator initialized");
        Self {
            state: Mutex::new(MetricsState::new()),
            probe,
        }
    }

    fn state(&self) -> MutexGuard<'_, MetricsState> {
        // Critical sections only push into pre-validated structures, so the
        // state behind a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completed request.
    ///
    /// The resource sample is taken before locking; if sampling fails the
    /// sample is omitted and the rest of the record still applies.
    pub fn record(&self, event: &RequestEvent) {
        let timestamp = Utc::now();

        let error_record = (!event.success).then(|| ErrorRecord {
            timestamp,
            error: event.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            tools_used: event.tools_used.clone(),
            request: truncate_chars(&event.request_text, ERROR_REQUEST_CHARS),
        });

        let sample = match self.probe.sample() {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to sample resource usage");
                None
            }
        };

        {
            let mut state = self.state();
            state.total_requests += 1;
            if event.success {
                state.successful_requests += 1;
            } else {
                state.failed_requests += 1;
            }

            state.total_latency += event.latency_seconds;
            state.latency_history.push(LatencyEntry {
                timestamp,
                latency: event.latency_seconds,
                success: event.success,
            });

            for tool in &event.tools_used {
                *state.tool_calls.entry(tool.clone()).or_insert(0) += 1;
            }

            if let Some(record) = error_record {
                state.error_count += 1;
                state.errors.push(record);
            }

            if let Some(sample) = sample {
                state.resource_usage.push(sample);
            }
        }

        if event.success {
            tracing::info!(
                latency_s = event.latency_seconds,
                tools = ?event.tools_used,
                "Request succeeded"
            );
        } else {
            tracing::error!(
                latency_s = event.latency_seconds,
                error = event.error.as_deref().unwrap_or("unknown error"),
                "Request failed"
            );
        }
    }

    /// Record the full request/response pair of an execution
    pub fn record_trace(
        &self,
        request: &str,
        response: &str,
        tools_used: &[String],
        latency_seconds: f64,
        success: bool,
    ) {
        let trace = ExecutionTrace {
            timestamp: Utc::now(),
            request: truncate_chars(request, TRACE_REQUEST_CHARS),
            response: truncate_chars(response, TRACE_RESPONSE_CHARS),
            tools_used: tools_used.to_vec(),
            latency: latency_seconds.max(0.0),
            success,
        };

        self.state().execution_traces.push(trace);

        tracing::debug!(
            tools = tools_used.len(),
            latency_s = latency_seconds,
            "Execution trace recorded"
        );
    }

    /// Score tool selection against the externally known expectation and
    /// keep the score in the precision history
    pub fn compute_precision(&self, expected_tools: &[String], actual_tools: &[String]) -> f64 {
        let precision = tool_precision(expected_tools, actual_tools);

        let record = PrecisionRecord {
            timestamp: Utc::now(),
            precision,
            expected: expected_tools.to_vec(),
            actual: actual_tools.to_vec(),
        };
        self.state().precision_scores.push(record);

        tracing::info!(precision, "Precision computed");
        precision
    }

    /// Count earlier checks with a similar query, then store this one.
    ///
    /// Returns the number of similar previous queries.
    pub fn check_consistency(&self, query: &str, response: &str) -> usize {
        // Compare on the stored form so long queries still match themselves
        let stored_query = truncate_chars(query, CONSISTENCY_TEXT_CHARS);
        let normalized = stored_query.to_lowercase();
        let mut state = self.state();

        let similar_previous = state
            .consistency_checks
            .iter()
            .filter(|check| {
                word_similarity(&normalized, &check.query.to_lowercase()) > CONSISTENCY_THRESHOLD
            })
            .count();

        state.consistency_checks.push(ConsistencyCheck {
            timestamp: Utc::now(),
            query: stored_query,
            response: truncate_chars(response, CONSISTENCY_TEXT_CHARS),
            similar_previous,
        });

        similar_previous
    }

    /// Compute a consistent view of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state();

        let total = state.total_requests;
        let (avg_latency, success_rate, error_rate) = if total > 0 {
            (
                state.total_latency / total as f64,
                state.successful_requests as f64 / total as f64 * 100.0,
                state.failed_requests as f64 / total as f64 * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let mut latencies: Vec<f64> = state.latency_history.iter().map(|e| e.latency).collect();
        latencies.sort_by(f64::total_cmp);

        let avg_precision = mean(state.precision_scores.iter().map(|p| p.precision));
        let avg_cpu = mean(state.resource_usage.iter().map(|r| r.cpu_percent));
        let avg_memory = mean(state.resource_usage.iter().map(|r| r.memory_percent));

        let tool_usage: BTreeMap<String, u64> = state
            .tool_calls
            .iter()
            .map(|(tool, count)| (tool.clone(), *count))
            .collect();
        let total_tool_calls = tool_usage.values().sum();

        MetricsSnapshot {
            total_requests: total,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            success_rate: round_to(success_rate, 2),
            error_rate: round_to(error_rate, 2),

            avg_latency: round_to(avg_latency, 3),
            p95_latency: round_to(percentile(&latencies, 0.95), 3),
            p99_latency: round_to(percentile(&latencies, 0.99), 3),
            latency_history: state.latency_history.tail(LATENCY_DISPLAY),

            avg_precision: round_to(avg_precision, 3),
            precision_history: state.precision_scores.tail(PRECISION_DISPLAY),

            tool_usage,
            total_tool_calls,

            recent_errors: state.errors.tail(ERROR_DISPLAY),
            error_count: state.error_count,

            avg_cpu_percent: round_to(avg_cpu, 2),
            avg_memory_percent: round_to(avg_memory, 2),
            resource_usage: state.resource_usage.tail(RESOURCE_DISPLAY),

            execution_traces: state.execution_traces.tail(TRACE_DISPLAY),
            consistency_checks: state.consistency_checks.len(),

            generated_at: Utc::now(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(Arc::new(SystemProbe::default()))
    }
}

/// Value at `floor(n * q)` of an ascending sample, clamped to the last index
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
