//! Persistence gateway abstraction.
//!
//! The queue keeps three collections, each stored under its own logical key:
//!
//! | Key | Content |
//! |---|---|
//! | `tickets` | waiting tickets, arrival order |
//! | `calledTickets` | called history, most recent first |
//! | `ticketCounters` | counter table |
//!
//! A gateway stores opaque JSON values per key. It must apply a batch passed
//! to [`PersistenceGateway::save`] all-or-nothing, because ticket generation
//! and call-next each change two collections that have to stay in step.
//!
//! # Implementations
//!
//! - `JsonFileGateway` (in `walkup-runtime`): one JSON document on disk
//! - `PostgresGateway` (in `walkup-postgres`): one JSONB row per key
//! - `InMemoryGateway` (in `walkup-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! runtime can hold an `Arc<dyn PersistenceGateway>`.

use crate::queue::QueueState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

/// Boxed future returned by gateway operations
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Errors that can occur while loading or saving queue state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The storage backend failed (I/O, database, connection).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error for {key}: {message}")]
    Serialization {
        /// Key whose value was malformed
        key: StorageKey,
        /// Decoder message
        message: String,
    },
}

/// Logical storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageKey {
    /// Waiting queue
    Tickets,
    /// Called history
    CalledTickets,
    /// Counter table
    #[serde(rename = "ticketCounters")]
    Counters,
}

impl StorageKey {
    /// Every key, in load order
    pub const ALL: [Self; 3] = [Self::Tickets, Self::CalledTickets, Self::Counters];

    /// Name of the key in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::CalledTickets => "calledTickets",
            Self::Counters => "ticketCounters",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKey {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| PersistenceError::Backend(format!("unknown storage key {s:?}")))
    }
}

/// One encoded collection ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    /// Where it goes
    pub key: StorageKey,
    /// Encoded collection
    pub value: Value,
}

/// Durable storage for the queue's three collections.
pub trait PersistenceGateway: Send + Sync {
    /// Loads the value stored under `key`, or `None` if nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Backend`] if the backend cannot be read.
    fn load(&self, key: StorageKey) -> GatewayFuture<'_, Option<Value>>;

    /// Writes every value in `batch`, atomically.
    ///
    /// Either all values become visible to subsequent loads or none do.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Backend`] if the write did not happen.
    fn save(&self, batch: Vec<StoredValue>) -> GatewayFuture<'_, ()>;

    /// Removes every stored key.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Backend`] if the backend cannot be cleared.
    fn clear(&self) -> GatewayFuture<'_, ()>;
}

/// Encodes the collection named by `key`.
///
/// # Errors
///
/// Returns [`PersistenceError::Serialization`] if encoding fails.
pub fn encode(state: &QueueState, key: StorageKey) -> Result<StoredValue, PersistenceError> {
    let value = match key {
        StorageKey::Tickets => serde_json::to_value(&state.waiting),
        StorageKey::CalledTickets => serde_json::to_value(&state.called),
        StorageKey::Counters => serde_json::to_value(&state.counters),
    }
    .map_err(|e| PersistenceError::Serialization {
        key,
        message: e.to_string(),
    })?;

    Ok(StoredValue { key, value })
}

/// Decodes a stored value into the matching collection of `state`.
///
/// # Errors
///
/// Returns [`PersistenceError::Serialization`] if the value is malformed.
pub fn decode_into(state: &mut QueueState, key: StorageKey, value: Value) -> Result<(), PersistenceError> {
    let malformed = |e: serde_json::Error| PersistenceError::Serialization {
        key,
        message: e.to_string(),
    };

    match key {
        StorageKey::Tickets => state.waiting = serde_json::from_value(value).map_err(malformed)?,
        StorageKey::CalledTickets => state.called = serde_json::from_value(value).map_err(malformed)?,
        StorageKey::Counters => state.counters = serde_json::from_value(value).map_err(malformed)?,
    }
    Ok(())
}

/// Loads the full queue state, defaulting every missing key.
///
/// # Errors
///
/// Propagates gateway and decoding failures.
pub async fn load_state(gateway: &dyn PersistenceGateway) -> Result<QueueState, PersistenceError> {
    let mut state = QueueState::default();
    for key in StorageKey::ALL {
        if let Some(value) = gateway.load(key).await? {
            decode_into(&mut state, key, value)?;
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_match_storage_layout() {
        assert_eq!(StorageKey::Tickets.as_str(), "tickets");
        assert_eq!(StorageKey::CalledTickets.as_str(), "calledTickets");
        assert_eq!(StorageKey::Counters.as_str(), "ticketCounters");
        for key in StorageKey::ALL {
            assert_eq!(key.as_str().parse::<StorageKey>().unwrap(), key);
            assert_eq!(serde_json::to_value(key).unwrap(), Value::from(key.as_str()));
        }
        assert!("theme".parse::<StorageKey>().is_err());
    }

    #[test]
    fn malformed_value_names_its_key() {
        let mut state = QueueState::default();
        let err = decode_into(&mut state, StorageKey::Counters, Value::from("nope")).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Serialization {
                key: StorageKey::Counters,
                ..
            }
        ));
    }

    #[test]
    fn empty_state_encodes_to_empty_collections() {
        let state = QueueState::default();
        assert_eq!(encode(&state, StorageKey::Tickets).unwrap().value, serde_json::json!([]));
        assert_eq!(encode(&state, StorageKey::Counters).unwrap().value, serde_json::json!({}));
    }
}
