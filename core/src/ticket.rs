//! Tickets, desks and call records.

use crate::catalog::{Prefix, ServiceId, SubServiceId};
use crate::error::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Unique ticket identity: `{prefix}-{number}-{created_at millis}`.
///
/// The timestamp keeps identities unique even when a reset makes a prefix
/// count from 1 again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Derives the identity of a freshly minted ticket
    #[must_use]
    pub fn derive(prefix: &Prefix, number: u64, created_at: DateTime<Utc>) -> Self {
        Self(format!("{prefix}-{number}-{}", created_at.timestamp_millis()))
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A numbered ticket waiting for (or already given) service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identity
    pub id: TicketId,
    /// Counter value at mint time
    pub number: u64,
    /// Prefix plus zero-padded number, e.g. `G004`
    pub display_number: String,
    /// Service the ticket was issued for
    pub service: ServiceId,
    /// Sub-service, when one was chosen at the kiosk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_service: Option<SubServiceId>,
    /// When the kiosk issued it
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Builds a ticket from a freshly issued counter value
    #[must_use]
    pub fn mint(
        prefix: &Prefix,
        number: u64,
        service: ServiceId,
        sub_service: Option<SubServiceId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::derive(prefix, number, created_at),
            number,
            display_number: display_number(prefix, number),
            service,
            sub_service,
            created_at,
        }
    }
}

/// Formats the human-readable ticket number (`G` + `4` → `G004`).
#[must_use]
pub fn display_number(prefix: &Prefix, number: u64) -> String {
    format!("{prefix}{number:03}")
}

/// Service desk number, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DeskNumber(NonZeroU32);

impl DeskNumber {
    /// Validates a desk number supplied by an operator.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidArgument`] for zero, negative or
    /// out-of-range values.
    pub fn new(value: i64) -> Result<Self, QueueError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| {
                QueueError::InvalidArgument(format!(
                    "desk number must be a positive integer, got {value}"
                ))
            })
    }

    /// The numeric value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for DeskNumber {
    type Error = QueueError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<DeskNumber> for u32 {
    fn from(desk: DeskNumber) -> Self {
        desk.get()
    }
}

/// Two-digit form shown on the public display (`03`).
impl fmt::Display for DeskNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.get())
    }
}

/// A ticket that a desk has called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalledTicket {
    /// The called ticket
    pub ticket: Ticket,
    /// Desk that called it
    pub desk: DeskNumber,
    /// When it was called
    pub called_at: DateTime<Utc>,
}

impl CalledTicket {
    /// Minutes between issue and call, never negative.
    ///
    /// A call stamped before the ticket's creation (clock skew between
    /// machines) counts as zero wait.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Millisecond spans fit comfortably in f64
    pub fn wait_minutes(&self) -> f64 {
        let millis = (self.called_at - self.ticket.created_at).num_milliseconds();
        millis.max(0) as f64 / 60_000.0
    }
}
