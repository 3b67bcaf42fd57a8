//! # Walkup Runtime
//!
//! The imperative shell around the queue reducer.
//!
//! [`QueueStore`] owns the queue state and serializes every mutation behind
//! one lock. Effects returned by the reducer are executed here: collections
//! named by `Persist` are written through the [`PersistenceGateway`] as one
//! batch, and `Publish` events go out on a broadcast channel once the batch
//! is durable.
//!
//! ## Core Components
//!
//! - **`QueueStore`**: state, reducer, environment and gateway
//! - **`JsonFileGateway`**: single-document file storage ([`file_gateway`])
//! - **Health**: [`HealthCheck`] / [`HealthStatus`] for readiness probes
//! - **Metrics**: Prometheus export ([`metrics`])
//!
//! ## Example
//!
//! ```ignore
//! use walkup_runtime::{QueueStore, StoreConfig, file_gateway::JsonFileGateway};
//!
//! let store = QueueStore::open(
//!     environment,
//!     Arc::new(JsonFileGateway::new("walkup-data.json")),
//!     StoreConfig::default(),
//! )
//! .await?;
//!
//! let ticket = store.generate_ticket(&ServiceId::new("general"), None).await?;
//! let called = store.call_next(3).await?;
//! ```
//!
//! [`PersistenceGateway`]: walkup_core::persistence::PersistenceGateway

use std::sync::Arc;

/// JSON document gateway
pub mod file_gateway;

/// Prometheus metrics for observability
pub mod metrics;

pub use store::{QueueStore, StoreConfig};

/// Health check status levels
///
/// Indicates the current health state of a component or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if status is unhealthy
    #[must_use]
    pub const fn is_unhealthy(self) -> bool {
        matches!(self, Self::Unhealthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Optional metadata (e.g., queue length)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Store module - the runtime for the queue reducer
pub mod store {
    use super::{Arc, HealthCheck};
    use crate::metrics::{PersistMetrics, QueueMetrics};
    use std::time::Instant;
    use tokio::sync::{Mutex, broadcast};
    use walkup_core::QueueError;
    use walkup_core::catalog::{Catalog, ServiceId, SubServiceId};
    use walkup_core::effect::Effect;
    use walkup_core::persistence::{
        self, PersistenceError, PersistenceGateway, StorageKey, StoredValue,
    };
    use walkup_core::queue::{
        DEFAULT_DISPLAY_HISTORY, DisplayBoard, QueueAction, QueueEnvironment, QueueEvent,
        QueueReducer, QueueSnapshot, QueueState,
    };
    use walkup_core::reducer::Reducer;
    use walkup_core::report::{ReportData, ReportOptions, compute_report};
    use walkup_core::ticket::{CalledTicket, DeskNumber, Ticket};

    /// Configuration for a [`QueueStore`]
    #[derive(Debug, Clone, Copy)]
    pub struct StoreConfig {
        /// Events buffered per subscriber before it starts lagging
        pub event_buffer: usize,
        /// Earlier calls shown beneath the current one on the display
        pub display_history: usize,
        /// Local offset used by reports
        pub report_options: ReportOptions,
    }

    impl StoreConfig {
        /// Set the event buffer size
        #[must_use]
        pub const fn with_event_buffer(mut self, event_buffer: usize) -> Self {
            self.event_buffer = event_buffer;
            self
        }

        /// Set how many earlier calls the display shows
        #[must_use]
        pub const fn with_display_history(mut self, display_history: usize) -> Self {
            self.display_history = display_history;
            self
        }

        /// Set the report options
        #[must_use]
        pub const fn with_report_options(mut self, report_options: ReportOptions) -> Self {
            self.report_options = report_options;
            self
        }
    }

    impl Default for StoreConfig {
        fn default() -> Self {
            Self {
                event_buffer: 64,
                display_history: DEFAULT_DISPLAY_HISTORY,
                report_options: ReportOptions::default(),
            }
        }
    }

    /// The queue engine.
    ///
    /// All mutations run one at a time. Each one reduces a draft copy of the
    /// state, writes the changed collections through the gateway, and only
    /// then replaces the live state and announces its events. A rejected or
    /// failed mutation leaves the state exactly as it was.
    pub struct QueueStore {
        state: Mutex<QueueState>,
        reducer: QueueReducer,
        environment: QueueEnvironment,
        gateway: Arc<dyn PersistenceGateway>,
        config: StoreConfig,
        events: broadcast::Sender<QueueEvent>,
    }

    impl QueueStore {
        /// Load the persisted queue and return a ready store.
        ///
        /// Missing keys start out empty.
        ///
        /// # Errors
        ///
        /// Returns [`QueueError::Persistence`] if the gateway cannot be read
        /// or holds malformed data.
        pub async fn open(
            environment: QueueEnvironment,
            gateway: Arc<dyn PersistenceGateway>,
            config: StoreConfig,
        ) -> Result<Self, QueueError> {
            let state = persistence::load_state(gateway.as_ref()).await?;
            tracing::info!(
                waiting = state.waiting.len(),
                called = state.called.len(),
                "Queue state loaded"
            );
            QueueMetrics::record_waiting(state.waiting.len());

            let (events, _) = broadcast::channel(config.event_buffer.max(1));

            Ok(Self {
                state: Mutex::new(state),
                reducer: QueueReducer::new(),
                environment,
                gateway,
                config,
                events,
            })
        }

        /// Service catalog
        #[must_use]
        pub fn catalog(&self) -> &Catalog {
            &self.environment.catalog
        }

        /// Store configuration
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Run one action through the reducer and commit it.
        ///
        /// Returns the events published by the action, in order.
        ///
        /// # Errors
        ///
        /// - Whatever the reducer rejects the action with
        /// - [`QueueError::Persistence`] if the gateway write failed; the
        ///   state is left untouched
        #[tracing::instrument(skip(self, action), name = "queue_dispatch")]
        pub async fn dispatch(&self, action: QueueAction) -> Result<Vec<QueueEvent>, QueueError> {
            let mut state = self.state.lock().await;

            let mut draft = state.clone();
            let effects = self.reducer.reduce(&mut draft, action, &self.environment)?;
            tracing::trace!("Reducer returned {} effects", effects.len());

            let mut clear = false;
            let mut batch = Vec::new();
            let mut events = Vec::new();
            for effect in effects {
                match effect {
                    Effect::Persist(key) => batch.push(persistence::encode(&draft, key)?),
                    Effect::Clear => clear = true,
                    Effect::Publish(event) => events.push(event),
                }
            }

            self.write(clear, batch).await?;

            *state = draft;
            QueueMetrics::record_waiting(state.waiting.len());

            // Still under the lock, so subscribers see events in commit order
            for event in &events {
                record_event(event);
                if self.events.send(event.clone()).is_err() {
                    tracing::trace!("No event subscribers");
                }
            }
            drop(state);

            Ok(events)
        }

        async fn write(&self, clear: bool, batch: Vec<StoredValue>) -> Result<(), PersistenceError> {
            let keys: Vec<StorageKey> = batch.iter().map(|stored| stored.key).collect();
            let start = Instant::now();

            let result = async {
                if clear {
                    self.gateway.clear().await?;
                }
                if !batch.is_empty() {
                    self.gateway.save(batch).await?;
                }
                Ok::<(), PersistenceError>(())
            }
            .await;

            match &result {
                Ok(()) => {
                    PersistMetrics::record_write(start.elapsed());
                    tracing::debug!(?keys, clear, "Batch committed");
                }
                Err(error) => {
                    PersistMetrics::record_failure();
                    tracing::error!(%error, ?keys, clear, "Batch rejected by gateway");
                }
            }
            result
        }

        /// Issue a ticket for `service`, optionally for one of its
        /// sub-services.
        ///
        /// # Errors
        ///
        /// - [`QueueError::NotFound`] for an unknown service or sub-service
        /// - [`QueueError::Persistence`] if the ticket could not be stored;
        ///   the counter does not advance
        pub async fn generate_ticket(
            &self,
            service: &ServiceId,
            sub_service: Option<&SubServiceId>,
        ) -> Result<Ticket, QueueError> {
            let events = self
                .dispatch(QueueAction::GenerateTicket {
                    service: service.clone(),
                    sub_service: sub_service.cloned(),
                })
                .await?;

            events
                .into_iter()
                .find_map(|event| match event {
                    QueueEvent::TicketIssued { ticket } => Some(ticket),
                    _ => None,
                })
                .ok_or_else(|| QueueError::Internal("ticket generation issued no ticket".to_string()))
        }

        /// Call the next ticket to `desk`.
        ///
        /// Priority tickets go first; otherwise the oldest ticket is called.
        ///
        /// # Errors
        ///
        /// - [`QueueError::InvalidArgument`] if `desk < 1`
        /// - [`QueueError::EmptyQueue`] if nothing is waiting
        /// - [`QueueError::Persistence`] if the call could not be stored
        pub async fn call_next(&self, desk: i64) -> Result<CalledTicket, QueueError> {
            let desk = DeskNumber::new(desk)?;
            let events = self.dispatch(QueueAction::CallNext { desk }).await?;

            events
                .into_iter()
                .find_map(|event| match event {
                    QueueEvent::TicketCalled { called } => Some(called),
                    _ => None,
                })
                .ok_or_else(|| QueueError::Internal("call-next called no ticket".to_string()))
        }

        /// Drop every waiting ticket, call record and counter.
        ///
        /// # Errors
        ///
        /// Returns [`QueueError::Persistence`] if storage could not be
        /// cleared; the queue is left as it was.
        pub async fn reset(&self) -> Result<(), QueueError> {
            self.dispatch(QueueAction::Reset).await?;
            tracing::info!("Queue reset");
            Ok(())
        }

        /// Consistent copy of the waiting queue and called history
        pub async fn snapshot(&self) -> QueueSnapshot {
            self.state.lock().await.snapshot()
        }

        /// Waiting tickets, oldest first
        pub async fn waiting(&self) -> Vec<Ticket> {
            self.state.lock().await.waiting.iter().cloned().collect()
        }

        /// Called tickets, most recent first
        pub async fn called(&self) -> Vec<CalledTicket> {
            self.state.lock().await.called.iter().cloned().collect()
        }

        /// Waiting tickets of one service, in arrival order.
        ///
        /// # Errors
        ///
        /// Returns [`QueueError::NotFound`] if the service is not in the
        /// catalog.
        pub async fn waiting_for(&self, service: &ServiceId) -> Result<Vec<Ticket>, QueueError> {
            if self.catalog().service(service).is_none() {
                return Err(QueueError::not_found("service", service));
            }
            Ok(self.state.lock().await.waiting_for(service))
        }

        /// What the public display shows
        pub async fn display_board(&self) -> DisplayBoard {
            self.state
                .lock()
                .await
                .display_board(self.config.display_history)
        }

        /// Report over the current queue contents.
        ///
        /// The lock is held only while copying; the report is computed on the
        /// copy.
        pub async fn report(&self) -> ReportData {
            let snapshot = self.snapshot().await;
            compute_report(
                self.catalog(),
                &snapshot.waiting,
                &snapshot.called,
                self.config.report_options,
            )
        }

        /// Subscribe to committed queue events.
        ///
        /// Only events committed after this call are received. A subscriber
        /// that falls more than `event_buffer` events behind gets
        /// `RecvError::Lagged`.
        #[must_use]
        pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
            self.events.subscribe()
        }

        /// Probe the gateway.
        ///
        /// Healthy if the counter key can be read.
        pub async fn health(&self) -> HealthCheck {
            let waiting = self.state.lock().await.waiting.len();

            let check = match self.gateway.load(StorageKey::Counters).await {
                Ok(_) => HealthCheck::healthy("queue_store"),
                Err(error) => {
                    tracing::warn!(%error, "Gateway health probe failed");
                    HealthCheck::unhealthy("queue_store", error.to_string())
                }
            };

            check
                .with_metadata("waiting", waiting.to_string())
                .with_metadata("subscribers", self.events.receiver_count().to_string())
        }
    }

    fn record_event(event: &QueueEvent) {
        match event {
            QueueEvent::TicketIssued { ticket } => {
                tracing::info!(
                    ticket = %ticket.display_number,
                    service = %ticket.service,
                    "Ticket issued"
                );
                QueueMetrics::record_issued(ticket.service.as_str());
            }
            QueueEvent::TicketCalled { called } => {
                tracing::info!(
                    ticket = %called.ticket.display_number,
                    desk = %called.desk,
                    "Ticket called"
                );
                QueueMetrics::record_called(called.ticket.service.as_str());
            }
            QueueEvent::QueueReset { .. } => QueueMetrics::record_reset(),
        }
    }
}
