//! HTTP surface for the Walkup queue.
//!
//! Thin Axum shell over [`walkup_runtime::QueueStore`]: handlers parse the
//! request, call one store operation, and map the result or
//! [`walkup_core::QueueError`] to a response.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, WebSocket
//! │  - Request parsing                      │  ← CORS, request tracing
//! │  - Response serialization               │
//! ├─────────────────────────────────────────┤
//! │         QueueStore (runtime)            │  ← persistence, metrics,
//! │                                         │    event broadcast
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Queue reducer, catalog, reports      │  ← No I/O, no side effects
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use walkup_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(store));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, ConfigError};
pub use error::AppError;
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
