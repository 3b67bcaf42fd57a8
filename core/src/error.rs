//! Errors surfaced by queue operations.
//!
//! The queue never recovers locally: every failure is handed back to the
//! caller, which decides how to present it and whether to retry.

use crate::persistence::PersistenceError;
use thiserror::Error;

/// Errors returned by queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A service or sub-service id is not in the catalog.
    ///
    /// This is a configuration or programming error: kiosks only offer
    /// catalog entries.
    #[error("Unknown {kind}: {id}")]
    NotFound {
        /// What kind of entity was looked up
        kind: &'static str,
        /// The id that was not found
        id: String,
    },

    /// Call-next was requested while nothing is waiting.
    #[error("No tickets are waiting")]
    EmptyQueue,

    /// An argument was outside its valid range (e.g. desk number `0`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage collaborator failed to load or save.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// The reducer finished without producing the outcome the caller waits for.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Builds a [`QueueError::NotFound`]
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether the caller can reasonably try the same request again later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyQueue | Self::Persistence(_))
    }
}
