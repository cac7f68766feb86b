//! Payload types pushed by the clinic booking backend.
//!
//! This crate describes the data carried inside server-push frames. It has no
//! dependencies on internal crates so that both the push consumer (`sse`) and
//! the REST gateway (`domain`) can share the same definitions without circular
//! dependencies.
//!
//! # Types
//!
//! - **Notification**: a user-facing notification with a stable identifier and
//!   a closed category set (approvals, shifts, bookings, clinic administration)
//! - **BookingUpdate**: a change to a booking's lifecycle or staffing
//!
//! Timestamps are kept as the ISO-8601 strings the backend sends; helpers parse
//! them with `chrono` when an ordering is needed.

use chrono::{DateTime, NaiveDateTime, Utc};

pub mod booking;
pub mod notification;

pub use booking::{BookingAction, BookingUpdate};
pub use notification::{Notification, NotificationCategory};

/// Parses a backend timestamp into UTC.
///
/// Accepts RFC 3339 strings and zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` strings,
/// which are interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
