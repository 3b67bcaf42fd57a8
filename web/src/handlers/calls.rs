//! Desk and display endpoints.

use crate::WebResult;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use walkup_core::queue::DisplayBoard;
use walkup_core::ticket::CalledTicket;

/// Body of `POST /api/calls`.
#[derive(Debug, Deserialize)]
pub struct CallNextRequest {
    /// Calling desk; must be positive
    pub desk: i64,
}

/// Call the next ticket to a desk.
///
/// Priority tickets are called before everything else; otherwise the oldest
/// waiting ticket wins.
///
/// # Endpoint
///
/// ```text
/// POST /api/calls
/// { "desk": 3 }
/// ```
///
/// # Errors
///
/// - 409 `EMPTY_QUEUE` when nothing is waiting
/// - 422 `VALIDATION_ERROR` for a desk number below 1
#[tracing::instrument(skip(state))]
pub async fn call_next(
    State(state): State<AppState>,
    Json(request): Json<CallNextRequest>,
) -> WebResult<(StatusCode, Json<CalledTicket>)> {
    let called = state.store.call_next(request.desk).await?;
    Ok((StatusCode::CREATED, Json(called)))
}

/// Called tickets, most recent first.
pub async fn list_calls(State(state): State<AppState>) -> Json<Vec<CalledTicket>> {
    Json(state.store.called().await)
}

/// The current call and the few before it.
pub async fn display_board(State(state): State<AppState>) -> Json<DisplayBoard> {
    Json(state.store.display_board().await)
}
