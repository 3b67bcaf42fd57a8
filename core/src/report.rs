//! Reporting over the full ticket history.
//!
//! [`compute_report`] is a pure function of its inputs. It never stores its
//! result and never mutates the queue; call it on a snapshot whenever a
//! report is needed.

use crate::catalog::{Catalog, ServiceId};
use crate::ticket::{CalledTicket, Ticket};
use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// First hour covered by the hourly histogram (08:00).
pub const FIRST_HOUR: u32 = 8;

/// Number of one-hour buckets (08:00 through 19:00).
pub const HOUR_BUCKETS: usize = 12;

/// Tickets issued during one hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    /// Bucket label, `"HH:00"`
    pub hour: String,
    /// Tickets created in that hour
    pub count: u32,
}

/// Tickets issued for one service (sub-services included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCount {
    /// Service id
    pub service: ServiceId,
    /// Service display name
    pub name: String,
    /// Waiting plus called tickets
    pub count: u32,
}

/// Average wait of one service's called tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWait {
    /// Service id
    pub service: ServiceId,
    /// Service display name
    pub name: String,
    /// Rounded average wait in whole minutes (0 when nothing was called)
    pub minutes: u64,
}

/// Aggregates derived from the waiting queue and called history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    /// Exactly [`HOUR_BUCKETS`] buckets, 08:00 first
    pub tickets_by_hour: Vec<HourBucket>,
    /// One entry per catalog service, catalog order
    pub tickets_by_type: Vec<ServiceCount>,
    /// One entry per catalog service, catalog order
    pub average_wait_time: Vec<ServiceWait>,
}

/// Zone whose wall clock decides a ticket's hour-of-day.
///
/// Named and local zones follow daylight-saving rules per timestamp, so a
/// ticket issued at 08:30 local time lands in the 08:00 bucket in winter and
/// in summer alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportZone {
    /// A fixed distance from UTC
    Fixed(FixedOffset),
    /// An IANA zone such as `Europe/Lisbon`
    Named(Tz),
    /// The host's zone, looked up for each timestamp
    Local,
}

impl ReportZone {
    /// Wall-clock hour of `at` in this zone
    #[must_use]
    pub fn hour_of(self, at: DateTime<Utc>) -> u32 {
        match self {
            Self::Fixed(offset) => at.with_timezone(&offset).hour(),
            Self::Named(tz) => at.with_timezone(&tz).hour(),
            Self::Local => at.with_timezone(&Local).hour(),
        }
    }
}

/// Parameters that would otherwise be ambient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Zone used to read a creation timestamp's local hour-of-day
    pub zone: ReportZone,
}

impl ReportOptions {
    /// Options for a fixed UTC offset
    #[must_use]
    pub const fn new(utc_offset: FixedOffset) -> Self {
        Self::in_zone(ReportZone::Fixed(utc_offset))
    }

    /// Options for any [`ReportZone`]
    #[must_use]
    pub const fn in_zone(zone: ReportZone) -> Self {
        Self { zone }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::in_zone(ReportZone::Named(Tz::UTC))
    }
}

/// Computes the report for the current queue contents.
///
/// - Hour histogram: every ticket (waiting or called) whose local creation
///   hour lies in 08..=19; others are left out.
/// - Type histogram: tickets per catalog service.
/// - Average wait: called tickets only, per service, rounded half away from
///   zero; 0 when a service has no called tickets.
#[must_use]
pub fn compute_report(
    catalog: &Catalog,
    waiting: &[Ticket],
    called: &[CalledTicket],
    options: ReportOptions,
) -> ReportData {
    let all_tickets = || waiting.iter().chain(called.iter().map(|c| &c.ticket));

    let mut hours = [0u32; HOUR_BUCKETS];
    for ticket in all_tickets() {
        let hour = options.zone.hour_of(ticket.created_at);
        if let Some(slot) = hour
            .checked_sub(FIRST_HOUR)
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| hours.get_mut(index))
        {
            *slot += 1;
        }
    }

    let tickets_by_hour = hours
        .iter()
        .zip(FIRST_HOUR..)
        .map(|(count, hour)| HourBucket {
            hour: format!("{hour:02}:00"),
            count: *count,
        })
        .collect();

    let tickets_by_type = catalog
        .services()
        .iter()
        .map(|service| ServiceCount {
            service: service.id.clone(),
            name: service.name.clone(),
            count: count_u32(all_tickets().filter(|t| t.service == service.id).count()),
        })
        .collect();

    let average_wait_time = catalog
        .services()
        .iter()
        .map(|service| {
            let (total, samples) = called
                .iter()
                .filter(|c| c.ticket.service == service.id)
                .fold((0.0_f64, 0u32), |(total, n), c| (total + c.wait_minutes(), n + 1));
            let average = if samples == 0 {
                0.0
            } else {
                total / f64::from(samples)
            };
            ServiceWait {
                service: service.id.clone(),
                name: service.name.clone(),
                minutes: round_minutes(average),
            }
        })
        .collect();

    ReportData {
        tickets_by_hour,
        tickets_by_type,
        average_wait_time,
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Non-negative, far below u64::MAX
fn round_minutes(minutes: f64) -> u64 {
    minutes.round().max(0.0) as u64
}
