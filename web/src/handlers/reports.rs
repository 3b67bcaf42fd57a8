//! Reporting and administration endpoints.

use crate::WebResult;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use walkup_core::report::ReportData;

/// Tickets per hour, per service, and average waits.
///
/// # Endpoint
///
/// ```text
/// GET /api/reports
/// ```
pub async fn report(State(state): State<AppState>) -> Json<ReportData> {
    Json(state.store.report().await)
}

/// Wipe tickets, calls and counters.
///
/// # Endpoint
///
/// ```text
/// POST /api/reset
/// ```
///
/// # Errors
///
/// 500 if the backend could not be cleared; the queue is then unchanged.
#[tracing::instrument(skip(state))]
pub async fn reset(State(state): State<AppState>) -> WebResult<StatusCode> {
    state.store.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}
