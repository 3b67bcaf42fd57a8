//! Integration tests for `QueueStore` against in-memory and file gateways.

#![allow(clippy::unwrap_used, clippy::panic)] // Test code panics on failure

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use walkup_core::QueueError;
use walkup_core::environment::SystemClock;
use walkup_core::persistence::{PersistenceGateway, StorageKey};
use walkup_core::queue::QueueEvent;
use walkup_runtime::file_gateway::JsonFileGateway;
use walkup_runtime::{HealthStatus, QueueStore, StoreConfig};
use walkup_testing::{
    FailingGateway, InMemoryGateway, ManualClock, at, exams, general, init_tracing, priority,
    reference_environment, sub,
};

async fn open_with(
    clock: Arc<ManualClock>,
    gateway: Arc<dyn PersistenceGateway>,
    config: StoreConfig,
) -> QueueStore {
    init_tracing();
    QueueStore::open(reference_environment(clock), gateway, config)
        .await
        .unwrap()
}

async fn open(gateway: Arc<dyn PersistenceGateway>) -> (Arc<ManualClock>, QueueStore) {
    let clock = Arc::new(ManualClock::new(at(9, 0)));
    let store = open_with(clock.clone(), gateway, StoreConfig::default()).await;
    (clock, store)
}

#[tokio::test]
async fn test_empty_gateway_opens_empty_queue() {
    let (_clock, store) = open(Arc::new(InMemoryGateway::new())).await;

    let snapshot = store.snapshot().await;
    assert!(snapshot.waiting.is_empty());
    assert!(snapshot.called.is_empty());
    assert!(store.display_board().await.current.is_none());
}

#[tokio::test]
async fn test_priority_ticket_is_called_first() {
    let (_clock, store) = open(Arc::new(InMemoryGateway::new())).await;

    let g1 = store.generate_ticket(&general(), None).await.unwrap();
    let p1 = store.generate_ticket(&priority(), None).await.unwrap();
    assert_eq!(g1.display_number, "G001");
    assert_eq!(p1.display_number, "P001");

    let first = store.call_next(1).await.unwrap();
    assert_eq!(first.ticket.display_number, "P001");
    assert_eq!(first.desk.to_string(), "01");

    let second = store.call_next(2).await.unwrap();
    assert_eq!(second.ticket.display_number, "G001");

    let err = store.call_next(1).await.unwrap_err();
    assert!(matches!(err, QueueError::EmptyQueue));
}

#[tokio::test]
async fn test_numbering_is_per_prefix() {
    let (_clock, store) = open(Arc::new(InMemoryGateway::new())).await;

    store.generate_ticket(&general(), None).await.unwrap();
    let info = store.generate_ticket(&general(), Some(&sub("info"))).await.unwrap();
    let g2 = store.generate_ticket(&general(), None).await.unwrap();
    let e1 = store.generate_ticket(&exams(), None).await.unwrap();

    assert_eq!(info.display_number, "GI001");
    assert_eq!(info.service, general());
    assert_eq!(g2.display_number, "G002");
    assert_eq!(e1.display_number, "E001");
}

#[tokio::test]
async fn test_rejected_requests_change_nothing() {
    let gateway = Arc::new(InMemoryGateway::new());
    let (_clock, store) = open(gateway.clone()).await;

    let err = store
        .generate_ticket(&walkup_core::catalog::ServiceId::new("lost-and-found"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound { kind: "service", .. }));

    let err = store.generate_ticket(&exams(), Some(&sub("info"))).await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound { kind: "sub-service", .. }));

    store.generate_ticket(&general(), None).await.unwrap();
    let err = store.call_next(0).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidArgument(_)));

    assert_eq!(store.waiting().await.len(), 1);
    assert_eq!(gateway.save_count(), 1);
}

#[tokio::test]
async fn test_failed_write_leaves_state_and_counter_untouched() {
    let gateway = Arc::new(FailingGateway::new());
    let (_clock, store) = open(gateway.clone()).await;
    let mut events = store.subscribe();

    gateway.fail_writes(true);
    let err = store.generate_ticket(&general(), None).await.unwrap_err();
    assert!(matches!(err, QueueError::Persistence(_)));
    assert!(err.is_retryable());
    assert!(store.waiting().await.is_empty());
    assert!(events.try_recv().is_err());

    gateway.fail_writes(false);
    let ticket = store.generate_ticket(&general(), None).await.unwrap();
    assert_eq!(ticket.display_number, "G001");

    gateway.fail_writes(true);
    let err = store.call_next(4).await.unwrap_err();
    assert!(matches!(err, QueueError::Persistence(_)));
    assert_eq!(store.waiting().await.len(), 1);
    assert!(store.called().await.is_empty());

    let err = store.reset().await.unwrap_err();
    assert!(matches!(err, QueueError::Persistence(_)));
    assert_eq!(store.waiting().await.len(), 1);
}

#[tokio::test]
async fn test_every_mutation_is_persisted() {
    let gateway = Arc::new(InMemoryGateway::new());
    let (_clock, store) = open(gateway.clone()).await;

    store.generate_ticket(&general(), None).await.unwrap();
    store.generate_ticket(&general(), Some(&sub("payment"))).await.unwrap();
    assert_eq!(gateway.stored(StorageKey::Counters), Some(json!({ "G": 1, "GP": 1 })));
    assert_eq!(
        gateway.stored(StorageKey::Tickets).and_then(|v| v.as_array().map(Vec::len)),
        Some(2)
    );
    assert_eq!(gateway.stored(StorageKey::CalledTickets), None);

    store.call_next(7).await.unwrap();
    assert_eq!(
        gateway.stored(StorageKey::Tickets).and_then(|v| v.as_array().map(Vec::len)),
        Some(1)
    );
    assert_eq!(
        gateway.stored(StorageKey::CalledTickets).and_then(|v| v.as_array().map(Vec::len)),
        Some(1)
    );
}

#[tokio::test]
async fn test_reopened_store_continues_numbering() {
    let gateway = Arc::new(InMemoryGateway::new());
    {
        let (_clock, store) = open(gateway.clone()).await;
        store.generate_ticket(&general(), None).await.unwrap();
        store.generate_ticket(&exams(), None).await.unwrap();
        store.call_next(1).await.unwrap();
    }

    let (_clock, store) = open(gateway.clone()).await;
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.waiting.len(), 1);
    assert_eq!(snapshot.waiting[0].display_number, "E001");
    assert_eq!(snapshot.called[0].ticket.display_number, "G001");

    let next = store.generate_ticket(&general(), None).await.unwrap();
    assert_eq!(next.display_number, "G002");
}

#[tokio::test]
async fn test_reset_empties_queue_and_restarts_numbering() {
    let gateway = Arc::new(InMemoryGateway::new());
    let (_clock, store) = open(gateway.clone()).await;
    let mut events = store.subscribe();

    store.generate_ticket(&general(), None).await.unwrap();
    store.generate_ticket(&general(), None).await.unwrap();
    store.call_next(1).await.unwrap();
    store.reset().await.unwrap();

    let snapshot = store.snapshot().await;
    assert!(snapshot.waiting.is_empty());
    assert!(snapshot.called.is_empty());
    for key in StorageKey::ALL {
        assert_eq!(gateway.stored(key), None);
    }

    let ticket = store.generate_ticket(&general(), None).await.unwrap();
    assert_eq!(ticket.display_number, "G001");

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            QueueEvent::TicketIssued { .. } => "issued",
            QueueEvent::TicketCalled { .. } => "called",
            QueueEvent::QueueReset { .. } => "reset",
        });
    }
    assert_eq!(kinds, vec!["issued", "issued", "called", "reset", "issued"]);
}

#[tokio::test]
async fn test_report_reflects_waits() {
    let (clock, store) = open(Arc::new(InMemoryGateway::new())).await;

    store.generate_ticket(&exams(), None).await.unwrap();
    store.generate_ticket(&exams(), None).await.unwrap();
    clock.advance(Duration::minutes(10));
    store.call_next(1).await.unwrap();
    clock.advance(Duration::minutes(5));
    store.call_next(1).await.unwrap();
    store.generate_ticket(&general(), None).await.unwrap();

    let report = store.report().await;
    let exams_wait = report
        .average_wait_time
        .iter()
        .find(|w| w.service == exams())
        .unwrap();
    // (10 + 15) / 2 = 12.5
    assert_eq!(exams_wait.minutes, 13);

    let general_count = report
        .tickets_by_type
        .iter()
        .find(|c| c.service == general())
        .unwrap();
    assert_eq!(general_count.count, 1);

    // 2 created at 09:00, 1 at 09:15
    assert_eq!(report.tickets_by_hour[1].hour, "09:00");
    assert_eq!(report.tickets_by_hour[1].count, 3);
}

#[tokio::test]
async fn test_display_board_respects_history_length() {
    let clock = Arc::new(ManualClock::new(at(10, 0)));
    let store = open_with(
        clock,
        Arc::new(InMemoryGateway::new()),
        StoreConfig::default().with_display_history(2),
    )
    .await;

    for _ in 0..4 {
        store.generate_ticket(&general(), None).await.unwrap();
    }
    for desk in 1..=4 {
        store.call_next(desk).await.unwrap();
    }

    let board = store.display_board().await;
    assert_eq!(board.current.unwrap().ticket.display_number, "G004");
    let previous: Vec<_> = board
        .previous
        .iter()
        .map(|c| c.ticket.display_number.as_str())
        .collect();
    assert_eq!(previous, vec!["G003", "G002"]);
}

#[tokio::test]
async fn test_waiting_for_filters_and_validates_service() {
    let (_clock, store) = open(Arc::new(InMemoryGateway::new())).await;

    store.generate_ticket(&general(), None).await.unwrap();
    store.generate_ticket(&exams(), None).await.unwrap();
    store.generate_ticket(&general(), Some(&sub("other"))).await.unwrap();

    let general_waiting = store.waiting_for(&general()).await.unwrap();
    let numbers: Vec<_> = general_waiting.iter().map(|t| t.display_number.as_str()).collect();
    assert_eq!(numbers, vec!["G001", "GO001"]);

    assert!(store.waiting_for(&priority()).await.unwrap().is_empty());
    assert!(matches!(
        store
            .waiting_for(&walkup_core::catalog::ServiceId::new("nope"))
            .await
            .unwrap_err(),
        QueueError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_numbers() {
    let (_clock, store) = open(Arc::new(InMemoryGateway::new())).await;
    let store = Arc::new(store);

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.generate_ticket(&general(), None).await })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().number);
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=32).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_health_follows_gateway() {
    let gateway = Arc::new(FailingGateway::new());
    let (_clock, store) = open(gateway.clone()).await;

    assert_eq!(store.health().await.status, HealthStatus::Healthy);

    gateway.fail_loads(true);
    let check = store.health().await;
    assert_eq!(check.status, HealthStatus::Unhealthy);
    assert!(check.message.is_some());
}

#[tokio::test]
async fn test_unreadable_gateway_fails_open() {
    let gateway = Arc::new(FailingGateway::new());
    gateway.fail_loads(true);

    let result = QueueStore::open(
        reference_environment(Arc::new(ManualClock::new(at(9, 0)))),
        gateway,
        StoreConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(QueueError::Persistence(_))));
}

#[tokio::test]
async fn test_file_gateway_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walkup-data.json");

    {
        let (_clock, store) = open(Arc::new(JsonFileGateway::new(&path))).await;
        store.generate_ticket(&priority(), None).await.unwrap();
        store.generate_ticket(&general(), None).await.unwrap();
        store.call_next(5).await.unwrap();
    }

    let (_clock, store) = open(Arc::new(JsonFileGateway::new(&path))).await;
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.waiting[0].display_number, "G001");
    assert_eq!(snapshot.called[0].ticket.display_number, "P001");
    assert_eq!(snapshot.called[0].desk.get(), 5);

    let next = store.generate_ticket(&priority(), None).await.unwrap();
    assert_eq!(next.display_number, "P002");

    store.reset().await.unwrap();
    assert!(!path.exists());
}

async fn sub_second_timestamps_survive(gateway: Arc<dyn PersistenceGateway>) {
    let clock = Arc::new(ManualClock::new(at(9, 0) + Duration::nanoseconds(123_456_789)));
    let store = open_with(clock.clone(), gateway.clone(), StoreConfig::default()).await;

    let ticket = store.generate_ticket(&general(), None).await.unwrap();
    store.generate_ticket(&priority(), None).await.unwrap();
    clock.advance(Duration::seconds(42) + Duration::nanoseconds(987_654_321));
    let called = store.call_next(3).await.unwrap();

    let reopened = open_with(clock, gateway, StoreConfig::default()).await;
    let snapshot = reopened.snapshot().await;
    assert_eq!(snapshot, store.snapshot().await);
    assert_eq!(snapshot.waiting[0].created_at, ticket.created_at);
    assert_eq!(snapshot.called[0].called_at, called.called_at);
    assert_eq!(
        snapshot.called[0].called_at - snapshot.called[0].ticket.created_at,
        Duration::seconds(42) + Duration::nanoseconds(987_654_321)
    );
}

#[tokio::test]
async fn test_in_memory_gateway_keeps_nanoseconds() {
    sub_second_timestamps_survive(Arc::new(InMemoryGateway::new())).await;
}

#[tokio::test]
async fn test_file_gateway_keeps_nanoseconds() {
    let dir = tempfile::tempdir().unwrap();
    sub_second_timestamps_survive(Arc::new(JsonFileGateway::new(dir.path().join("walkup-data.json"))))
        .await;
}

#[tokio::test]
async fn test_system_clock_state_reloads_exactly() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walkup-data.json");

    let store = QueueStore::open(
        reference_environment(Arc::new(SystemClock)),
        Arc::new(JsonFileGateway::new(&path)),
        StoreConfig::default(),
    )
    .await
    .unwrap();
    for _ in 0..3 {
        store.generate_ticket(&general(), None).await.unwrap();
        store.generate_ticket(&exams(), None).await.unwrap();
    }
    store.call_next(1).await.unwrap();
    store.call_next(2).await.unwrap();

    let reopened = QueueStore::open(
        reference_environment(Arc::new(SystemClock)),
        Arc::new(JsonFileGateway::new(&path)),
        StoreConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(reopened.snapshot().await, store.snapshot().await);
}

proptest::proptest! {
    /// Whatever sequence of kiosk and desk operations ran, reopening the
    /// store over the same gateway yields the same queue.
    #[test]
    fn prop_reopen_restores_committed_state(ops in walkup_testing::properties::operations(40)) {
        tokio_test::block_on(async {
            let gateway: Arc<dyn PersistenceGateway> = Arc::new(InMemoryGateway::new());
            let (clock, store) = open(gateway.clone()).await;

            for (is_kiosk, request) in ops {
                clock.advance(Duration::seconds(30));
                if is_kiosk {
                    store
                        .generate_ticket(&request.service, request.sub_service.as_ref())
                        .await
                        .unwrap();
                } else if let Err(error) = store.call_next(1).await {
                    assert!(matches!(error, QueueError::EmptyQueue));
                }
            }

            let reopened = open_with(clock, gateway, StoreConfig::default()).await;
            assert_eq!(reopened.snapshot().await, store.snapshot().await);
        });
    }
}
