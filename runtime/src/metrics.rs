//! Prometheus metrics for the queue.
//!
//! The store records through the `metrics` facade; nothing is exported
//! until a [`MetricsServer`] installs the Prometheus recorder. The binary
//! serves [`MetricsServer::render`] on its own port.
//!
//! # Example
//!
//! ```rust,no_run
//! use walkup_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! let body = server.render().unwrap_or_default();
//! # drop(body);
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Tickets issued
pub const TICKETS_ISSUED: &str = "walkup.tickets.issued";
/// Tickets called to a desk
pub const TICKETS_CALLED: &str = "walkup.tickets.called";
/// Queue resets
pub const QUEUE_RESETS: &str = "walkup.queue.resets";
/// Tickets currently waiting
pub const QUEUE_WAITING: &str = "walkup.queue.waiting";
/// Rejected gateway writes
pub const PERSIST_FAILURES: &str = "walkup.persist.failures";
/// Gateway write latency
pub const PERSIST_DURATION: &str = "walkup.persist.duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it should be served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the metrics endpoint should listen on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe the queue metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one recorder can exist per process. If one is already installed
    /// (e.g. by another test), this logs a warning and succeeds without a
    /// handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(TICKETS_ISSUED, "Total number of tickets issued");
    describe_counter!(TICKETS_CALLED, "Total number of tickets called to a desk");
    describe_counter!(QUEUE_RESETS, "Total number of queue resets");
    describe_gauge!(QUEUE_WAITING, "Tickets currently waiting");
    describe_counter!(PERSIST_FAILURES, "Total number of rejected gateway writes");
    describe_histogram!(PERSIST_DURATION, "Time taken to write a batch through the gateway");
}

/// Queue metrics recorder.
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record an issued ticket.
    pub fn record_issued(service: &str) {
        counter!(TICKETS_ISSUED, "service" => service.to_string()).increment(1);
    }

    /// Record a called ticket.
    pub fn record_called(service: &str) {
        counter!(TICKETS_CALLED, "service" => service.to_string()).increment(1);
    }

    /// Record a reset.
    pub fn record_reset() {
        counter!(QUEUE_RESETS).increment(1);
    }

    /// Record the waiting queue length.
    #[allow(clippy::cast_precision_loss)] // Queue lengths < 2^52
    pub fn record_waiting(len: usize) {
        gauge!(QUEUE_WAITING).set(len as f64);
    }
}

/// Persistence metrics recorder.
pub struct PersistMetrics;

impl PersistMetrics {
    /// Record a completed gateway write.
    pub fn record_write(duration: Duration) {
        histogram!(PERSIST_DURATION).record(duration.as_secs_f64());
    }

    /// Record a rejected gateway write.
    pub fn record_failure() {
        counter!(PERSIST_FAILURES).increment(1);
    }
}
