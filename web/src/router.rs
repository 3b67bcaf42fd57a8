//! Route table.

use crate::handlers::{calls, health, reports, tickets, websocket};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// ```text
/// GET  /health             liveness
/// GET  /ready              storage probe
/// GET  /ws                 event stream
/// GET  /api/services       catalog
/// POST /api/tickets        issue a ticket
/// GET  /api/tickets        waiting queue (?service=)
/// POST /api/calls          call next
/// GET  /api/calls          called history
/// GET  /api/display        display board
/// GET  /api/reports        report
/// POST /api/reset          wipe the queue
/// ```
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/services", get(tickets::list_services))
        .route(
            "/tickets",
            post(tickets::create_ticket).get(tickets::list_tickets),
        )
        .route("/calls", post(calls::call_next).get(calls::list_calls))
        .route("/display", get(calls::display_board))
        .route("/reports", get(reports::report))
        .route("/reset", post(reports::reset));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/ws", get(websocket::handle))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
