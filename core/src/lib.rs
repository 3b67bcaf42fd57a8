//! # Walkup Core
//!
//! The functional core of a walk-up queue-ticketing system: a kiosk issues
//! numbered tickets per service, desks call the next ticket, and a public
//! display announces it.
//!
//! This crate contains no I/O. Everything that touches storage, time or the
//! network is described as a value and injected through traits.
//!
//! ## Core Concepts
//!
//! - **Catalog**: the fixed set of services and sub-services, each with a
//!   globally unique prefix ([`catalog`])
//! - **Counter table**: per-prefix monotonic counters ([`counter`])
//! - **Queue state**: waiting tickets, called history and counters ([`queue`])
//! - **Reducer**: `(State, Action, Environment) → Result<Effects, Error>`
//! - **Effect**: a description of what the runtime must persist or publish
//! - **Report**: a pure projection over the ticket history ([`report`])
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use walkup_core::catalog::{Catalog, ServiceId};
//! use walkup_core::environment::SystemClock;
//! use walkup_core::queue::{QueueAction, QueueEnvironment, QueueReducer, QueueState};
//! use walkup_core::reducer::Reducer;
//!
//! let env = QueueEnvironment::new(Arc::new(SystemClock), Arc::new(Catalog::reference()));
//! let mut state = QueueState::default();
//!
//! let effects = QueueReducer::new()
//!     .reduce(
//!         &mut state,
//!         QueueAction::GenerateTicket {
//!             service: ServiceId::new("general"),
//!             sub_service: None,
//!         },
//!         &env,
//!     )
//!     .unwrap();
//!
//! assert_eq!(state.waiting[0].display_number, "G001");
//! assert!(!effects.is_empty());
//! ```

pub mod catalog;
pub mod counter;
pub mod error;
pub mod persistence;
pub mod queue;
pub mod report;
pub mod ticket;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::QueueError;
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// A reducer that rejects an action returns an error and leaves the state as
/// it found it.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Effects returned by a single reduction
    pub type Effects<E> = SmallVec<[Effect<E>; 4]>;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Event`: Facts published once the reduction is committed
    /// - `Error`: Why an action was rejected
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The event type carried by [`Effect::Publish`]
        type Event;

        /// The rejection type
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action cannot be applied. The state
        /// must not have been modified in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Effects<Self::Event>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are NOT executed by the reducer. They are descriptions returned
/// from reducers and carried out by the runtime, which decides how to make
/// them durable.
pub mod effect {
    use crate::persistence::StorageKey;

    /// Effect type - describes a side effect to be executed
    #[derive(Debug, Clone, PartialEq)]
    pub enum Effect<Event> {
        /// The collection stored under this key changed and must be saved
        Persist(StorageKey),

        /// Every stored collection must be dropped
        Clear,

        /// Publish an event to observers once the state is committed
        Publish(Event),
    }

    impl<Event> Effect<Event> {
        /// Storage key touched by this effect, if any
        #[must_use]
        pub const fn storage_key(&self) -> Option<StorageKey> {
            match self {
                Self::Persist(key) => Some(*key),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::persistence::StorageKey;

    #[test]
    fn storage_key_is_only_reported_for_persist() {
        assert_eq!(
            Effect::<()>::Persist(StorageKey::Counters).storage_key(),
            Some(StorageKey::Counters)
        );
        assert_eq!(Effect::<()>::Publish(()).storage_key(), None);
        assert_eq!(Effect::<()>::Clear.storage_key(), None);
    }
}
