//! Queue state and the call-next policy.
//!
//! [`QueueReducer`] is the only place tickets are minted, called or wiped.
//! It mutates [`QueueState`] in place and returns effects naming the
//! collections that changed and the event to announce; the runtime makes
//! those durable before anyone else observes the new state.
//!
//! # Call-next policy
//!
//! 1. If any waiting ticket belongs to a priority service, the earliest
//!    arrived of them is called.
//! 2. Otherwise the head of the queue (oldest overall) is called.

use crate::catalog::{Catalog, ServiceId, SubServiceId};
use crate::effect::Effect;
use crate::environment::Clock;
use crate::error::QueueError;
use crate::persistence::StorageKey;
use crate::reducer::{Effects, Reducer};
use crate::ticket::{CalledTicket, DeskNumber, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of earlier calls shown beneath the current one on the display.
pub const DEFAULT_DISPLAY_HISTORY: usize = 5;

// ============================================================================
// State
// ============================================================================

/// Everything the queue owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueState {
    /// Tickets not yet called, oldest first
    pub waiting: VecDeque<Ticket>,
    /// Called tickets, most recent first
    pub called: VecDeque<CalledTicket>,
    /// Per-prefix counters
    pub counters: crate::counter::CounterTable,
}

impl QueueState {
    /// Consistent copy of both ticket lists
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            waiting: self.waiting.iter().cloned().collect(),
            called: self.called.iter().cloned().collect(),
        }
    }

    /// Waiting tickets of one service, in arrival order
    #[must_use]
    pub fn waiting_for(&self, service: &ServiceId) -> Vec<Ticket> {
        self.waiting
            .iter()
            .filter(|ticket| ticket.service == *service)
            .cloned()
            .collect()
    }

    /// The most recent call plus up to `previous` earlier ones
    #[must_use]
    pub fn display_board(&self, previous: usize) -> DisplayBoard {
        DisplayBoard {
            current: self.called.front().cloned(),
            previous: self.called.iter().skip(1).take(previous).cloned().collect(),
        }
    }

    /// Position of the ticket the next call would take.
    #[must_use]
    pub fn next_position(&self, catalog: &Catalog) -> Option<usize> {
        if self.waiting.is_empty() {
            return None;
        }
        self.waiting
            .iter()
            .position(|ticket| catalog.is_priority(&ticket.service))
            .or(Some(0))
    }
}

/// Point-in-time copy of the waiting queue and called history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Waiting tickets, oldest first
    pub waiting: Vec<Ticket>,
    /// Called tickets, most recent first
    pub called: Vec<CalledTicket>,
}

/// What the public display shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayBoard {
    /// Ticket being announced
    pub current: Option<CalledTicket>,
    /// Earlier calls, most recent first
    pub previous: Vec<CalledTicket>,
}

// ============================================================================
// Actions and Events
// ============================================================================

/// Requests the queue can process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueAction {
    /// Issue a ticket at the kiosk
    GenerateTicket {
        /// Requested service
        service: ServiceId,
        /// Optional sub-service
        sub_service: Option<SubServiceId>,
    },
    /// Call the next ticket to a desk
    CallNext {
        /// Calling desk
        desk: DeskNumber,
    },
    /// Drop every ticket, call and counter
    Reset,
}

/// Facts announced after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A ticket joined the waiting queue
    TicketIssued {
        /// The new ticket
        ticket: Ticket,
    },
    /// A desk called a ticket
    TicketCalled {
        /// The call record
        called: CalledTicket,
    },
    /// The queue was wiped
    QueueReset {
        /// When
        at: DateTime<Utc>,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the queue reducer.
#[derive(Clone)]
pub struct QueueEnvironment {
    /// Clock for ticket and call timestamps
    pub clock: Arc<dyn Clock>,
    /// Service catalog
    pub catalog: Arc<Catalog>,
}

impl QueueEnvironment {
    /// Creates a new `QueueEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, catalog: Arc<Catalog>) -> Self {
        Self { clock, catalog }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the ticket queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueReducer;

impl QueueReducer {
    /// Creates a new `QueueReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn generate_ticket(
        state: &mut QueueState,
        service: &ServiceId,
        sub_service: Option<SubServiceId>,
        env: &QueueEnvironment,
    ) -> Result<Effects<QueueEvent>, QueueError> {
        let resolved = env.catalog.resolve(service, sub_service.as_ref())?;
        let prefix = resolved.effective_prefix();

        let number = state.counters.next_number(prefix.as_str());
        let ticket = Ticket::mint(prefix, number, service.clone(), sub_service, env.clock.now());
        state.waiting.push_back(ticket.clone());

        Ok(smallvec![
            Effect::Persist(StorageKey::Tickets),
            Effect::Persist(StorageKey::Counters),
            Effect::Publish(QueueEvent::TicketIssued { ticket }),
        ])
    }

    fn call_next(
        state: &mut QueueState,
        desk: DeskNumber,
        env: &QueueEnvironment,
    ) -> Result<Effects<QueueEvent>, QueueError> {
        let ticket = state
            .next_position(&env.catalog)
            .and_then(|position| state.waiting.remove(position))
            .ok_or(QueueError::EmptyQueue)?;

        let called = CalledTicket {
            ticket,
            desk,
            called_at: env.clock.now(),
        };
        state.called.push_front(called.clone());

        Ok(smallvec![
            Effect::Persist(StorageKey::Tickets),
            Effect::Persist(StorageKey::CalledTickets),
            Effect::Publish(QueueEvent::TicketCalled { called }),
        ])
    }

    fn reset(state: &mut QueueState, env: &QueueEnvironment) -> Effects<QueueEvent> {
        state.waiting.clear();
        state.called.clear();
        state.counters.clear();

        smallvec![
            Effect::Clear,
            Effect::Publish(QueueEvent::QueueReset { at: env.clock.now() }),
        ]
    }
}

impl Reducer for QueueReducer {
    type State = QueueState;
    type Action = QueueAction;
    type Environment = QueueEnvironment;
    type Event = QueueEvent;
    type Error = QueueError;

    fn reduce(
        &self,
        state: &mut QueueState,
        action: QueueAction,
        env: &QueueEnvironment,
    ) -> Result<Effects<QueueEvent>, QueueError> {
        match action {
            QueueAction::GenerateTicket {
                service,
                sub_service,
            } => Self::generate_ticket(state, &service, sub_service, env),
            QueueAction::CallNext { desk } => Self::call_next(state, desk, env),
            QueueAction::Reset => Ok(Self::reset(state, env)),
        }
    }
}
