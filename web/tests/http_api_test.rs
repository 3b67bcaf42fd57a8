//! HTTP API tests against an in-process router.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code uses unwrap/expect for clear failure messages

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use walkup_core::persistence::PersistenceGateway;
use walkup_core::queue::DisplayBoard;
use walkup_core::report::ReportData;
use walkup_core::ticket::{CalledTicket, Ticket};
use walkup_runtime::{QueueStore, StoreConfig};
use walkup_testing::{FailingGateway, InMemoryGateway, ManualClock, at, reference_environment};
use walkup_web::{AppState, build_router};

async fn server_with(gateway: Arc<dyn PersistenceGateway>, clock: Arc<ManualClock>) -> TestServer {
    let store = QueueStore::open(
        reference_environment(clock),
        gateway,
        StoreConfig::default().with_display_history(2),
    )
    .await
    .expect("open store");
    TestServer::new(build_router(AppState::new(Arc::new(store)))).expect("test server")
}

async fn server() -> (TestServer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(at(9, 0)));
    let server = server_with(Arc::new(InMemoryGateway::new()), clock.clone()).await;
    (server, clock)
}

#[tokio::test]
async fn test_health_endpoints() {
    let (server, _) = server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");

    let response = server.get("/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["metadata"]["waiting"], "0");
}

#[tokio::test]
async fn test_ready_reports_unavailable_storage() {
    let gateway = Arc::new(FailingGateway::new());
    let server = server_with(gateway.clone(), Arc::new(ManualClock::new(at(9, 0)))).await;

    gateway.fail_loads(true);
    let response = server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_services_lists_catalog() {
    let (server, _) = server().await;

    let response = server.get("/api/services").await;
    response.assert_status_ok();
    let services: Vec<Value> = response.json();
    let ids: Vec<_> = services.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["general", "priority", "exams"]);
    assert_eq!(services[1]["priority"], true);
}

#[tokio::test]
async fn test_create_ticket() {
    let (server, _) = server().await;

    let response = server
        .post("/api/tickets")
        .json(&json!({ "service": "general", "sub_service": "payment" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let ticket: Ticket = response.json();
    assert_eq!(ticket.display_number, "GP001");

    let response = server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    let ticket: Ticket = response.json();
    assert_eq!(ticket.display_number, "G001");
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let (server, _) = server().await;

    let response = server.post("/api/tickets").json(&json!({ "service": "loans" })).await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");

    let response = server
        .post("/api/tickets")
        .json(&json!({ "service": "priority", "sub_service": "payment" }))
        .await;
    response.assert_status_not_found();

    let response = server.get("/api/tickets").add_query_param("service", "loans").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_list_tickets_with_filter() {
    let (server, _) = server().await;
    for service in ["general", "exams", "general"] {
        server.post("/api/tickets").json(&json!({ "service": service })).await;
    }

    let all: Vec<Ticket> = server.get("/api/tickets").await.json();
    let numbers: Vec<_> = all.iter().map(|t| t.display_number.as_str()).collect();
    assert_eq!(numbers, vec!["G001", "E001", "G002"]);

    let response = server.get("/api/tickets").add_query_param("service", "exams").await;
    response.assert_status_ok();
    let exams: Vec<Ticket> = response.json();
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0].display_number, "E001");
}

#[tokio::test]
async fn test_call_next_serves_priority_first() {
    let (server, clock) = server().await;
    server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    server.post("/api/tickets").json(&json!({ "service": "priority" })).await;
    clock.advance(chrono::Duration::minutes(4));

    let response = server.post("/api/calls").json(&json!({ "desk": 2 })).await;
    response.assert_status(StatusCode::CREATED);
    let called: CalledTicket = response.json();
    assert_eq!(called.ticket.display_number, "P001");
    assert_eq!(called.desk.get(), 2);

    let called: CalledTicket = server.post("/api/calls").json(&json!({ "desk": 5 })).await.json();
    assert_eq!(called.ticket.display_number, "G001");

    let history: Vec<CalledTicket> = server.get("/api/calls").await.json();
    let numbers: Vec<_> = history.iter().map(|c| c.ticket.display_number.as_str()).collect();
    assert_eq!(numbers, vec!["G001", "P001"]);
}

#[tokio::test]
async fn test_call_next_on_empty_queue_conflicts() {
    let (server, _) = server().await;

    let response = server.post("/api/calls").json(&json!({ "desk": 1 })).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "EMPTY_QUEUE");
}

#[tokio::test]
async fn test_invalid_desk_is_rejected() {
    let (server, _) = server().await;
    server.post("/api/tickets").json(&json!({ "service": "exams" })).await;

    for desk in [0, -3] {
        let response = server.post("/api/calls").json(&json!({ "desk": desk })).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    let waiting: Vec<Ticket> = server.get("/api/tickets").await.json();
    assert_eq!(waiting.len(), 1);
}

#[tokio::test]
async fn test_display_board_keeps_recent_calls() {
    let (server, _) = server().await;

    let board: DisplayBoard = server.get("/api/display").await.json();
    assert!(board.current.is_none());

    for _ in 0..4 {
        server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    }
    for desk in 1..=4 {
        server.post("/api/calls").json(&json!({ "desk": desk })).await;
    }

    let board: DisplayBoard = server.get("/api/display").await.json();
    assert_eq!(board.current.unwrap().ticket.display_number, "G004");
    let previous: Vec<_> = board
        .previous
        .iter()
        .map(|c| c.ticket.display_number.as_str())
        .collect();
    assert_eq!(previous, vec!["G003", "G002"]);
}

#[tokio::test]
async fn test_report_counts_and_waits() {
    let (server, clock) = server().await;
    server.post("/api/tickets").json(&json!({ "service": "exams" })).await;
    server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    clock.advance(chrono::Duration::minutes(10));
    server.post("/api/calls").json(&json!({ "desk": 1 })).await;

    let response = server.get("/api/reports").await;
    response.assert_status_ok();
    let report: ReportData = response.json();

    assert_eq!(report.tickets_by_hour.len(), 12);
    assert_eq!(report.tickets_by_hour[1].hour, "09:00");
    assert_eq!(report.tickets_by_hour[1].count, 2);

    let exams = report
        .average_wait_time
        .iter()
        .find(|w| w.service.as_str() == "exams")
        .unwrap();
    assert_eq!(exams.minutes, 10);
    let general = report
        .tickets_by_type
        .iter()
        .find(|c| c.service.as_str() == "general")
        .unwrap();
    assert_eq!(general.count, 1);
}

#[tokio::test]
async fn test_reset_empties_queue_and_restarts_numbering() {
    let (server, _) = server().await;
    server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    server.post("/api/calls").json(&json!({ "desk": 1 })).await;
    server.post("/api/tickets").json(&json!({ "service": "general" })).await;

    server.post("/api/reset").await.assert_status(StatusCode::NO_CONTENT);

    let waiting: Vec<Ticket> = server.get("/api/tickets").await.json();
    assert!(waiting.is_empty());
    let called: Vec<CalledTicket> = server.get("/api/calls").await.json();
    assert!(called.is_empty());

    let ticket: Ticket = server
        .post("/api/tickets")
        .json(&json!({ "service": "general" }))
        .await
        .json();
    assert_eq!(ticket.display_number, "G001");
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    let gateway = Arc::new(FailingGateway::new());
    let server = server_with(gateway.clone(), Arc::new(ManualClock::new(at(9, 0)))).await;

    gateway.fail_writes(true);
    let response = server.post("/api/tickets").json(&json!({ "service": "general" })).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    assert!(!body["message"].as_str().unwrap().contains("injected"));

    gateway.fail_writes(false);
    let ticket: Ticket = server
        .post("/api/tickets")
        .json(&json!({ "service": "general" }))
        .await
        .json();
    assert_eq!(ticket.display_number, "G001");
}
