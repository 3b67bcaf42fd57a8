//! Kiosk endpoints: issue tickets and list the waiting queue.

use crate::WebResult;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use walkup_core::catalog::{Catalog, ServiceId, SubServiceId};
use walkup_core::ticket::Ticket;

/// Body of `POST /api/tickets`.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    /// Requested service
    pub service: ServiceId,
    /// Optional sub-service of `service`
    #[serde(default)]
    pub sub_service: Option<SubServiceId>,
}

/// Query of `GET /api/tickets`.
#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    /// Only list tickets for this service
    pub service: Option<String>,
}

/// The service catalog the kiosk offers.
///
/// # Endpoint
///
/// ```text
/// GET /api/services
/// ```
#[allow(clippy::unused_async)]
pub async fn list_services(State(state): State<AppState>) -> Json<Catalog> {
    Json(state.store.catalog().clone())
}

/// Issue a ticket.
///
/// # Endpoint
///
/// ```text
/// POST /api/tickets
/// { "service": "general", "sub_service": "schedule" }
/// ```
///
/// # Errors
///
/// - 404 `NOT_FOUND` for a service or sub-service missing from the catalog
/// - 500 if the ticket could not be persisted
#[tracing::instrument(skip(state))]
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> WebResult<(StatusCode, Json<Ticket>)> {
    let ticket = state
        .store
        .generate_ticket(&request.service, request.sub_service.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Waiting tickets, oldest first.
///
/// # Endpoint
///
/// ```text
/// GET /api/tickets?service=exams
/// ```
///
/// # Errors
///
/// 404 `NOT_FOUND` when filtering by an unknown service.
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> WebResult<Json<Vec<Ticket>>> {
    let tickets = match query.service {
        Some(service) => state.store.waiting_for(&ServiceId::new(service)).await?,
        None => state.store.waiting().await,
    };
    Ok(Json(tickets))
}
