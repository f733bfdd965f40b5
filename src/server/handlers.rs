// HTTP request handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::middleware::{rate_limit_middleware, security_headers_middleware};
use super::TelemetryServer;
use crate::admission::{AuditEvent, AUDIT_CAPACITY};
use crate::metrics::{
    export_snapshot, generate_report, render_prometheus, ErrorRecord, ExecutionTrace,
    LatencyEntry, MetricsSnapshot, MetricsSummary, RequestEvent, ResourceSample,
};

/// Security events returned by GET /security/logs
const SECURITY_LOG_WINDOW: usize = 100;

/// Create the main application router
pub fn create_router(server: Arc<TelemetryServer>) -> Router {
    let settings = &server.config().server;

    // Routes behind the per-client admission gate
    let gated = Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/summary", get(get_summary))
        .route("/metrics/latency", get(get_latency))
        .route("/metrics/tools", get(get_tools))
        .route("/metrics/errors", get(get_errors))
        .route("/metrics/resources", get(get_resources))
        .route("/metrics/traces", get(get_traces))
        .route("/metrics/export", get(export_metrics))
        .route("/metrics/prometheus", get(prometheus_endpoint))
        .route("/report/generate", get(generate_report_endpoint))
        .route("/events", post(record_event))
        .route("/security/logs", get(security_logs));

    let gated = if settings.rate_limit_enabled {
        gated.route_layer(middleware::from_fn_with_state(
            Arc::clone(&server),
            rate_limit_middleware,
        ))
    } else {
        gated
    };

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/security/status", get(security_status))
        .merge(gated)
        .with_state(Arc::clone(&server));

    if settings.security_headers {
        router.layer(middleware::from_fn(security_headers_middleware))
    } else {
        router
    }
}

/// Success envelope shared by the JSON endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Handle GET /metrics - Full snapshot
async fn get_metrics(
    State(server): State<Arc<TelemetryServer>>,
) -> Json<ApiResponse<MetricsSnapshot>> {
    ApiResponse::ok(server.metrics().snapshot())
}

/// Handle GET /metrics/summary - Headline numbers
async fn get_summary(
    State(server): State<Arc<TelemetryServer>>,
) -> Json<ApiResponse<MetricsSummary>> {
    ApiResponse::ok(server.metrics().snapshot().summary())
}

#[derive(Debug, Serialize)]
pub struct LatencyView {
    pub avg_latency: f64,
    pub p95_latency: f64,
    pub p99_latency: f64,
    pub history: Vec<LatencyEntry>,
}

/// Handle GET /metrics/latency
async fn get_latency(State(server): State<Arc<TelemetryServer>>) -> Json<ApiResponse<LatencyView>> {
    let snapshot = server.metrics().snapshot();
    ApiResponse::ok(LatencyView {
        avg_latency: snapshot.avg_latency,
        p95_latency: snapshot.p95_latency,
        p99_latency: snapshot.p99_latency,
        history: snapshot.latency_history,
    })
}

#[derive(Debug, Serialize)]
pub struct ToolsView {
    pub tool_usage: BTreeMap<String, u64>,
    pub total_calls: u64,
}

/// Handle GET /metrics/tools
async fn get_tools(State(server): State<Arc<TelemetryServer>>) -> Json<ApiResponse<ToolsView>> {
    let snapshot = server.metrics().snapshot();
    ApiResponse::ok(ToolsView {
        tool_usage: snapshot.tool_usage,
        total_calls: snapshot.total_tool_calls,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorsView {
    pub error_count: u64,
    pub error_rate: f64,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Handle GET /metrics/errors
async fn get_errors(State(server): State<Arc<TelemetryServer>>) -> Json<ApiResponse<ErrorsView>> {
    let snapshot = server.metrics().snapshot();
    ApiResponse::ok(ErrorsView {
        error_count: snapshot.error_count,
        error_rate: snapshot.error_rate,
        recent_errors: snapshot.recent_errors,
    })
}

#[derive(Debug, Serialize)]
pub struct ResourcesView {
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub history: Vec<ResourceSample>,
}

/// Handle GET /metrics/resources
async fn get_resources(
    State(server): State<Arc<TelemetryServer>>,
) -> Json<ApiResponse<ResourcesView>> {
    let snapshot = server.metrics().snapshot();
    ApiResponse::ok(ResourcesView {
        avg_cpu: snapshot.avg_cpu_percent,
        avg_memory: snapshot.avg_memory_percent,
        history: snapshot.resource_usage,
    })
}

/// Handle GET /metrics/traces
async fn get_traces(
    State(server): State<Arc<TelemetryServer>>,
) -> Json<ApiResponse<Vec<ExecutionTrace>>> {
    ApiResponse::ok(server.metrics().snapshot().execution_traces)
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    pub data: MetricsSnapshot,
}

/// Handle GET /metrics/export - Write metrics.json and return it
async fn export_metrics(
    State(server): State<Arc<TelemetryServer>>,
) -> Result<Json<ExportResponse>, AppError> {
    let snapshot = server.metrics().snapshot();
    let path = server.config().metrics.export_path.clone();

    let exported = snapshot.clone();
    let target = path.clone();
    tokio::task::spawn_blocking(move || export_snapshot(&target, &exported)).await??;

    Ok(Json(ExportResponse {
        success: true,
        message: format!("Metrics exported to {}", path.display()),
        data: snapshot,
    }))
}

/// Handle GET /metrics/prometheus - Text exposition format
async fn prometheus_endpoint(
    State(server): State<Arc<TelemetryServer>>,
) -> Result<Response, AppError> {
    let body = render_prometheus(&server.metrics().snapshot())?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub report: String,
}

/// Handle GET /report/generate - Render the diagnostic report
async fn generate_report_endpoint(
    State(server): State<Arc<TelemetryServer>>,
) -> Result<Json<ReportResponse>, AppError> {
    let snapshot = server.metrics().snapshot();
    let report = generate_report(&snapshot);

    if let Some(dir) = server.config().metrics.report_dir.clone() {
        let path = dir.join(format!(
            "analysis_report_{}.txt",
            snapshot.generated_at.format("%Y%m%d_%H%M%S")
        ));
        let contents = report.clone();
        let written = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            std::fs::write(&path, contents)?;
            Ok::<_, std::io::Error>(path)
        })
        .await?;

        match written {
            Ok(path) => tracing::info!(path = %path.display(), "Report written"),
            Err(e) => tracing::warn!(error = %e, "Failed to write report file"),
        }
    }

    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}

/// Request body for POST /events: one completed agent request
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub success: bool,
    pub latency_seconds: f64,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub request_text: String,
    /// Agent reply; enables trace and consistency tracking for successes
    #[serde(default)]
    pub response: Option<String>,
    /// Tools the request should have used; enables precision scoring
    #[serde(default)]
    pub expected_tools: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EventRecorded {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_previous: Option<usize>,
}

/// Handle POST /events - Record a completed agent request
async fn record_event(
    State(server): State<Arc<TelemetryServer>>,
    Json(request): Json<EventRequest>,
) -> Result<Json<ApiResponse<EventRecorded>>, AppError> {
    let metrics = Arc::clone(server.metrics());

    // Resource sampling blocks for the probe interval
    let recorded = tokio::task::spawn_blocking(move || {
        let event = RequestEvent::new(
            request.success,
            request.latency_seconds,
            request.tools_used,
            request.error,
            request.request_text,
        );
        metrics.record(&event);

        let mut similar_previous = None;
        if event.success {
            if let Some(response) = &request.response {
                metrics.record_trace(
                    &event.request_text,
                    response,
                    &event.tools_used,
                    event.latency_seconds,
                    true,
                );
                similar_previous = Some(metrics.check_consistency(&event.request_text, response));
            }
        }

        let precision = request
            .expected_tools
            .map(|expected| metrics.compute_precision(&expected, &event.tools_used));

        EventRecorded {
            recorded: true,
            precision,
            similar_previous,
        }
    })
    .await?;

    Ok(ApiResponse::ok(recorded))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Handle GET /health - Health check endpoint
pub async fn health_check(State(server): State<Arc<TelemetryServer>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        success: true,
        status: "healthy".to_string(),
        service: "agent-telemetry".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: server.uptime().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct SecurityStatus {
    pub success: bool,
    pub rate_limiting: bool,
    pub security_headers: bool,
    pub max_requests_per_window: usize,
    pub window_seconds: u64,
    pub log_retention_limit: usize,
}

/// Handle GET /security/status
async fn security_status(State(server): State<Arc<TelemetryServer>>) -> Json<SecurityStatus> {
    let config = server.config();
    Json(SecurityStatus {
        success: true,
        rate_limiting: config.server.rate_limit_enabled,
        security_headers: config.server.security_headers,
        max_requests_per_window: server.rate_limiter().max_requests(),
        window_seconds: server.rate_limiter().window().as_secs(),
        log_retention_limit: AUDIT_CAPACITY,
    })
}

#[derive(Debug, Serialize)]
pub struct SecurityLogs {
    pub success: bool,
    pub total_events: u64,
    pub events: Vec<AuditEvent>,
}

/// Handle GET /security/logs - Recent audit events
async fn security_logs(State(server): State<Arc<TelemetryServer>>) -> Json<SecurityLogs> {
    Json(SecurityLogs {
        success: true,
        total_events: server.audit().total(),
        events: server.audit().recent(SECURITY_LOG_WINDOW),
    })
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");

        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
