use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a notification, sent as the `type` field of the payload.
///
/// Unrecognized categories deserialize to [`NotificationCategory::Unknown`] so a
/// newer backend never causes a notification to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    // Vet / staff account review
    Approved,
    Rejected,

    // Shift scheduling
    ShiftAssigned,
    ShiftUpdated,
    ShiftDeleted,

    // Booking lifecycle
    BookingCreated,
    BookingConfirmed,
    #[serde(rename = "BOOKING_CHECKIN", alias = "BOOKING_CHECK_IN")]
    BookingCheckIn,
    BookingCompleted,
    BookingCancelled,

    // Clinic administration
    ClinicPendingApproval,
    ClinicApproved,
    ClinicRejected,
    ClinicSuspended,

    #[serde(other)]
    Unknown,
}

/// A notification delivered over the push stream or listed through REST.
///
/// `notification_id` is unique and stable; the same notification may be
/// delivered more than once across reconnects and consumers are expected to
/// deduplicate on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: String,

    // Clinic context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,

    // Shift window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_end_time: Option<String>,

    // Booking reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_code: Option<String>,
}

impl Notification {
    /// The creation time, if the backend sent a parseable timestamp.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        crate::parse_timestamp(&self.created_at)
    }

    /// Returns the backend-provided message, or `None` when it is blank.
    pub fn provided_message(&self) -> Option<&str> {
        let trimmed = self.message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
