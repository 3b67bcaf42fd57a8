//! # Walkup Testing
//!
//! Testing utilities and helpers for the Walkup queue system.
//!
//! This crate provides:
//! - Deterministic clocks
//! - In-memory and failure-injecting persistence gateways
//! - A Given-When-Then harness for reducers
//! - proptest strategies for ticket requests
//!
//! ## Example
//!
//! ```ignore
//! use walkup_testing::{InMemoryGateway, ManualClock, at};
//! use walkup_runtime::{QueueStore, StoreConfig};
//!
//! #[tokio::test]
//! async fn priority_goes_first() {
//!     let clock = Arc::new(ManualClock::new(at(9, 0)));
//!     let store = QueueStore::open(
//!         reference_environment(clock),
//!         Arc::new(InMemoryGateway::new()),
//!         StoreConfig::default(),
//!     )
//!     .await?;
//!     store.generate_ticket(&general(), None).await?;
//!     store.generate_ticket(&priority(), None).await?;
//!     let called = store.call_next(1).await?;
//!     assert_eq!(called.ticket.display_number, "P001");
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use walkup_core::environment::Clock;


pub use reducer_test::ReducerTest;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use walkup_core::persistence::{
        GatewayFuture, PersistenceError, PersistenceGateway, StorageKey, StoredValue,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use walkup_testing::mocks::FixedClock;
    /// use walkup_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock the test moves by hand.
    ///
    /// Used to put a known wait between a ticket's creation and its call.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Starts the clock at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Moves the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = time;
        }

        /// Moves the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// In-memory persistence gateway.
    ///
    /// Batches are applied under one lock, so they are atomic by construction.
    #[derive(Debug, Default)]
    pub struct InMemoryGateway {
        values: Mutex<BTreeMap<StorageKey, Value>>,
        saves: AtomicUsize,
    }

    impl InMemoryGateway {
        /// Creates an empty gateway
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Current value stored under `key`
        #[must_use]
        pub fn stored(&self, key: StorageKey) -> Option<Value> {
            self.lock().get(&key).cloned()
        }

        /// Number of successful `save` calls
        #[must_use]
        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<StorageKey, Value>> {
            self.values.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    impl PersistenceGateway for InMemoryGateway {
        fn load(&self, key: StorageKey) -> GatewayFuture<'_, Option<Value>> {
            let value = self.stored(key);
            Box::pin(async move { Ok(value) })
        }

        fn save(&self, batch: Vec<StoredValue>) -> GatewayFuture<'_, ()> {
            {
                let mut values = self.lock();
                for StoredValue { key, value } in batch {
                    values.insert(key, value);
                }
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn clear(&self) -> GatewayFuture<'_, ()> {
            self.lock().clear();
            Box::pin(async { Ok(()) })
        }
    }

    /// Gateway that fails on demand.
    ///
    /// Wraps an [`InMemoryGateway`]; while failing is switched on, every
    /// write is rejected and nothing reaches the inner store.
    #[derive(Debug, Default)]
    pub struct FailingGateway {
        inner: InMemoryGateway,
        fail_writes: std::sync::atomic::AtomicBool,
        fail_loads: std::sync::atomic::AtomicBool,
    }

    impl FailingGateway {
        /// Creates a gateway that initially succeeds
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent `save`/`clear` calls fail (or succeed again)
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Makes subsequent `load` calls fail (or succeed again)
        pub fn fail_loads(&self, fail: bool) {
            self.fail_loads.store(fail, Ordering::SeqCst);
        }

        /// The backing store
        #[must_use]
        pub const fn inner(&self) -> &InMemoryGateway {
            &self.inner
        }

        fn rejected() -> PersistenceError {
            PersistenceError::Backend("injected failure".to_string())
        }
    }

    impl PersistenceGateway for FailingGateway {
        fn load(&self, key: StorageKey) -> GatewayFuture<'_, Option<Value>> {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Box::pin(async { Err(Self::rejected()) });
            }
            self.inner.load(key)
        }

        fn save(&self, batch: Vec<StoredValue>) -> GatewayFuture<'_, ()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Box::pin(async { Err(Self::rejected()) });
            }
            self.inner.save(batch)
        }

        fn clear(&self) -> GatewayFuture<'_, ()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Box::pin(async { Err(Self::rejected()) });
            }
            self.inner.clear()
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use std::sync::Arc;
    use walkup_core::catalog::{Catalog, ServiceId, SubServiceId};
    use walkup_core::environment::Clock;
    use walkup_core::queue::QueueEnvironment;

    /// Queue environment over the reference catalog
    #[must_use]
    pub fn reference_environment(clock: Arc<dyn Clock>) -> QueueEnvironment {
        QueueEnvironment::new(clock, Arc::new(Catalog::reference()))
    }

    /// `general` service id
    #[must_use]
    pub fn general() -> ServiceId {
        ServiceId::new("general")
    }

    /// `priority` service id
    #[must_use]
    pub fn priority() -> ServiceId {
        ServiceId::new("priority")
    }

    /// `exams` service id
    #[must_use]
    pub fn exams() -> ServiceId {
        ServiceId::new("exams")
    }

    /// Sub-service id shorthand
    #[must_use]
    pub fn sub(id: &str) -> SubServiceId {
        SubServiceId::new(id)
    }

    /// Installs a test subscriber so `tracing` output shows up with `--nocapture`.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn,walkup=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use walkup_core::catalog::{ServiceId, SubServiceId};

    /// A kiosk request against the reference catalog.
    #[derive(Debug, Clone)]
    pub struct TicketRequest {
        /// Service
        pub service: ServiceId,
        /// Optional sub-service
        pub sub_service: Option<SubServiceId>,
    }

    /// Any valid request against the reference catalog
    pub fn ticket_request() -> impl Strategy<Value = TicketRequest> {
        prop_oneof![
            Just(("general", None)),
            Just(("general", Some("info"))),
            Just(("general", Some("schedule"))),
            Just(("general", Some("payment"))),
            Just(("general", Some("other"))),
            Just(("priority", None)),
            Just(("exams", None)),
        ]
        .prop_map(|(service, sub): (&str, Option<&str>)| TicketRequest {
            service: ServiceId::new(service),
            sub_service: sub.map(SubServiceId::new),
        })
    }

    /// Interleaved kiosk (`true`) and desk (`false`) operations
    pub fn operations(max: usize) -> impl Strategy<Value = Vec<(bool, TicketRequest)>> {
        prop::collection::vec((any::<bool>(), ticket_request()), 1..max)
    }
}

// Re-export commonly used items
pub use helpers::{exams, general, init_tracing, priority, reference_environment, sub};
pub use mocks::{FailingGateway, FixedClock, InMemoryGateway, ManualClock};

/// 2025-01-01 at the given UTC time
///
/// # Panics
///
/// Panics if `hour`/`minute` are out of range.
#[must_use]
#[allow(clippy::expect_used)]
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, hour, minute, 0)
        .single()
        .expect("test timestamp should be valid")
}

/// Create a default fixed clock for tests (2025-01-01 09:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(at(9, 0))
}
