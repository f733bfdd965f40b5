// Metrics module
// Request telemetry aggregation, reporting and export

mod aggregator;
mod export;
mod exposition;
mod report;
mod resources;
mod similarity;
mod types;
mod window;

pub use aggregator::{
    percentile, MetricsAggregator, CONSISTENCY_CAPACITY, ERROR_DETAIL_CAPACITY,
    LATENCY_HISTORY_CAPACITY, PRECISION_CAPACITY, RESOURCE_CAPACITY, TRACE_CAPACITY,
};
pub use export::{export_snapshot, load_snapshot};
pub use exposition::render_prometheus;
pub use report::{evaluate, generate_report, Finding, Severity};
pub use resources::{NoopProbe, ResourceProbe, SystemProbe};
pub use similarity::{tool_precision, word_similarity};
pub use types::{
    truncate_chars, ConsistencyCheck, ErrorRecord, ExecutionTrace, LatencyEntry, MetricsSnapshot,
    MetricsSummary, PrecisionRecord, RequestEvent, ResourceSample,
};
pub use window::BoundedWindow;
