//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use walkup_runtime::HealthCheck;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check the storage backend.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Body of the readiness endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Checked component
    pub component: String,
    /// `healthy` or `unhealthy`
    pub status: String,
    /// Failure detail, if any
    pub message: Option<String>,
    /// Extra diagnostics (waiting tickets, live subscribers)
    pub metadata: BTreeMap<String, String>,
}

impl From<HealthCheck> for HealthResponse {
    fn from(check: HealthCheck) -> Self {
        Self {
            component: check.component,
            status: check.status.to_string(),
            message: check.message,
            metadata: check.metadata.into_iter().collect(),
        }
    }
}

/// Health check with store diagnostics (for readiness).
///
/// Probes the persistence backend through the store.
///
/// # Status Codes
///
/// - 200 OK: Healthy
/// - 503 Service Unavailable: Unhealthy
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "component": "queue_store",
///   "status": "healthy",
///   "message": null,
///   "metadata": { "subscribers": "0", "waiting": "3" }
/// }
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.store.health().await;

    let status = if health.status.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(health.into()))
}
