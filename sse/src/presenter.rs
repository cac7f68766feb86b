use events::{Notification, NotificationCategory};
use log::*;
use std::fmt;
use std::sync::Arc;

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Where toasts are rendered. Supplied by the UI layer.
pub trait ToastSink: Send + Sync {
    fn display(&self, severity: Severity, message: &str);
}

/// Toast sink that writes to the log, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToastSink;

impl ToastSink for LogToastSink {
    fn display(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => warn!("[toast:{severity}] {message}"),
            _ => info!("[toast:{severity}] {message}"),
        }
    }
}

/// Severity shown for each notification category.
pub fn severity_for(category: NotificationCategory) -> Severity {
    use NotificationCategory::*;

    match category {
        Approved | BookingConfirmed | BookingCompleted | ClinicApproved => Severity::Success,
        Rejected | ClinicRejected => Severity::Error,
        ShiftUpdated | ShiftDeleted | BookingCancelled | ClinicSuspended => Severity::Warning,
        ShiftAssigned | BookingCreated | BookingCheckIn | ClinicPendingApproval | Unknown => {
            Severity::Info
        }
    }
}

/// Generic text used when the payload carries no message.
pub fn fallback_message(category: NotificationCategory) -> &'static str {
    use NotificationCategory::*;

    match category {
        Approved => "Your account has been approved",
        Rejected => "Your request has been rejected",
        ShiftAssigned => "You have been assigned a new shift",
        ShiftUpdated => "One of your shifts has been updated",
        ShiftDeleted => "One of your shifts has been cancelled",
        BookingCreated => "A new booking has been created",
        BookingConfirmed => "A booking has been confirmed",
        BookingCheckIn => "A customer has checked in",
        BookingCompleted => "A booking has been completed",
        BookingCancelled => "A booking has been cancelled",
        ClinicPendingApproval => "A clinic is waiting for approval",
        ClinicApproved => "Your clinic has been approved",
        ClinicRejected => "Your clinic registration has been rejected",
        ClinicSuspended => "Your clinic has been suspended",
        Unknown => "You have a new notification",
    }
}

/// Maps a notification to a toast and hands it to the sink.
#[derive(Clone)]
pub struct Presenter {
    sink: Arc<dyn ToastSink>,
}

impl Presenter {
    pub fn new(sink: Arc<dyn ToastSink>) -> Self {
        Self { sink }
    }

    /// Pure mapping from a notification to (severity, message).
    pub fn toast_for(notification: &Notification) -> (Severity, String) {
        let severity = severity_for(notification.category);
        let message = match notification.provided_message() {
            Some(message) => message.to_string(),
            None => match (notification.category, notification.reason.as_deref()) {
                (NotificationCategory::Rejected | NotificationCategory::ClinicRejected, Some(reason))
                    if !reason.trim().is_empty() =>
                {
                    format!("{}: {}", fallback_message(notification.category), reason.trim())
                }
                (category, _) => fallback_message(category).to_string(),
            },
        };
        (severity, message)
    }

    /// Shows exactly one toast for the notification.
    pub fn present(&self, notification: &Notification) {
        let (severity, message) = Self::toast_for(notification);
        trace!(
            "Presenting notification {} as {severity}",
            notification.notification_id
        );
        self.sink.display(severity, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingToasts;

    fn notification(category: NotificationCategory, message: &str) -> Notification {
        Notification {
            notification_id: "n1".to_string(),
            category,
            message: message.to_string(),
            reason: None,
            read: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            clinic_id: None,
            clinic_name: None,
            shift_id: None,
            shift_date: None,
            shift_start_time: None,
            shift_end_time: None,
            booking_id: None,
            booking_code: None,
        }
    }

    #[test]
    fn test_category_severities() {
        use NotificationCategory::*;

        assert_eq!(severity_for(Approved), Severity::Success);
        assert_eq!(severity_for(Rejected), Severity::Error);
        assert_eq!(severity_for(ShiftAssigned), Severity::Info);
        assert_eq!(severity_for(ShiftUpdated), Severity::Warning);
        assert_eq!(severity_for(ShiftDeleted), Severity::Warning);
        assert_eq!(severity_for(BookingCreated), Severity::Info);
        assert_eq!(severity_for(BookingCheckIn), Severity::Info);
        assert_eq!(severity_for(BookingConfirmed), Severity::Success);
        assert_eq!(severity_for(BookingCompleted), Severity::Success);
        assert_eq!(severity_for(BookingCancelled), Severity::Warning);
        assert_eq!(severity_for(Unknown), Severity::Info);
    }

    #[test]
    fn test_payload_message_wins() {
        let (severity, message) =
            Presenter::toast_for(&notification(NotificationCategory::Approved, "ok"));
        assert_eq!(severity, Severity::Success);
        assert_eq!(message, "ok");
    }

    #[test]
    fn test_blank_message_falls_back_to_generic_text() {
        let (severity, message) = Presenter::toast_for(&notification(
            NotificationCategory::BookingCancelled,
            "   ",
        ));
        assert_eq!(severity, Severity::Warning);
        assert_eq!(message, "A booking has been cancelled");
    }

    #[test]
    fn test_rejection_fallback_includes_reason() {
        let mut rejected = notification(NotificationCategory::Rejected, "");
        rejected.reason = Some("missing license".to_string());

        let (severity, message) = Presenter::toast_for(&rejected);
        assert_eq!(severity, Severity::Error);
        assert_eq!(message, "Your request has been rejected: missing license");
    }

    #[test]
    fn test_unknown_category_is_generic_info() {
        let (severity, message) =
            Presenter::toast_for(&notification(NotificationCategory::Unknown, ""));
        assert_eq!(severity, Severity::Info);
        assert_eq!(message, "You have a new notification");
    }

    #[test]
    fn test_present_calls_sink_once_per_notification() {
        let toasts = Arc::new(RecordingToasts::default());
        let presenter = Presenter::new(toasts.clone());
        let approved = notification(NotificationCategory::Approved, "ok");

        presenter.present(&approved);
        presenter.present(&approved);

        assert_eq!(
            toasts.calls(),
            vec![
                (Severity::Success, "ok".to_string()),
                (Severity::Success, "ok".to_string())
            ]
        );
    }
}
