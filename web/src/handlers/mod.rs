//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by the screen that uses
//! them: the kiosk issues tickets, the desks call them, the display and the
//! reports only read.

pub mod calls;
pub mod health;
pub mod reports;
pub mod tickets;
pub mod websocket;

// Re-export common handler utilities
pub use health::{health_check, readiness_check};
