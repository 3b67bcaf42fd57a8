//! Application state for Axum handlers.

use std::sync::Arc;
use walkup_runtime::QueueStore;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; the store itself is shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The queue every handler operates on
    pub store: Arc<QueueStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(store: Arc<QueueStore>) -> Self {
        Self { store }
    }
}
