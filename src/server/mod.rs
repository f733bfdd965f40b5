// Telemetry Server Module
// HTTP boundary exposing snapshots, reports and event ingestion

mod handlers;
mod middleware;

pub use handlers::{create_router, health_check, ApiResponse, AppError, EventRequest};
pub use middleware::{
    client_id, rate_limit_middleware, security_headers_middleware, RATE_LIMIT_LIMIT_HEADER,
    RATE_LIMIT_REMAINING_HEADER, SECURITY_HEADERS,
};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{AuditLog, RateLimiter};
use crate::config::Config;
use crate::errors::{address_in_use_error, TelemetryError};
use crate::metrics::{MetricsAggregator, SystemProbe};

/// Main telemetry server structure.
///
/// Owns the process-wide aggregator, limiter and audit log; handlers reach
/// them through `Arc<TelemetryServer>` state.
pub struct TelemetryServer {
    /// Metrics aggregator (shared with the request-handling layer)
    metrics: Arc<MetricsAggregator>,
    /// Per-client admission control
    rate_limiter: Arc<RateLimiter>,
    /// Security audit trail
    audit: Arc<AuditLog>,
    /// Effective configuration
    config: Config,
    started_at: Instant,
}

impl TelemetryServer {
    /// Create a server around already constructed components
    pub fn new(
        config: Config,
        metrics: Arc<MetricsAggregator>,
        rate_limiter: Arc<RateLimiter>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            metrics,
            rate_limiter,
            audit,
            config,
            started_at: Instant::now(),
        }
    }

    /// Build every component from configuration
    pub fn from_config(config: Config) -> Self {
        let audit = Arc::new(AuditLog::new());
        let rate_limiter = Arc::new(
            RateLimiter::from_settings(&config.rate_limit).with_audit(Arc::clone(&audit)),
        );
        let probe = Arc::new(SystemProbe::new(config.metrics.cpu_sample_interval()));
        let metrics = Arc::new(MetricsAggregator::new(probe));

        Self::new(config, metrics, rate_limiter, audit)
    }

    /// Start the HTTP server
    pub async fn serve(self) -> Result<()> {
        let bind_address = self.config.server.bind_address.clone();
        let addr: SocketAddr = bind_address
            .parse()
            .map_err(|_| TelemetryError::InvalidAddress(bind_address.clone()))?;

        let app_state = Arc::new(self);

        let app = create_router(app_state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| address_in_use_error(&bind_address))?;

        tracing::info!("Starting agent telemetry server on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Telemetry server stopped");
        Ok(())
    }

    /// Get reference to the metrics aggregator
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Get reference to the rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Get reference to the audit log
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Get server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
