use crate::counter::Counters;
use crate::error::{ErrorKind, FrameErrorKind};
use crate::message::{parse_frame, Envelope, Event, EventType};
use crate::presenter::Presenter;
use events::{BookingUpdate, Notification};
use log::*;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Type alias for the on_notification callback.
pub type OnNotification = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Type alias for the on_shift_update callback.
pub type OnShiftUpdate = Arc<dyn Fn(&Value) + Send + Sync>;

/// Type alias for the on_booking_update callback.
pub type OnBookingUpdate = Arc<dyn Fn(&BookingUpdate) + Send + Sync>;

/// Optional per-event hooks supplied by UI components.
///
/// All hooks are optional. They run on the supervisor task, in frame order, and
/// must not block.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_notification: Option<OnNotification>,
    on_shift_update: Option<OnShiftUpdate>,
    on_booking_update: Option<OnBookingUpdate>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_notification", &self.on_notification.is_some())
            .field("on_shift_update", &self.on_shift_update.is_some())
            .field("on_booking_update", &self.on_booking_update.is_some())
            .finish()
    }
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_notification(mut self, f: impl Fn(&Notification) + Send + Sync + 'static) -> Self {
        self.on_notification = Some(Arc::new(f));
        self
    }

    pub fn on_shift_update(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_shift_update = Some(Arc::new(f));
        self
    }

    pub fn on_booking_update(
        mut self,
        f: impl Fn(&BookingUpdate) + Send + Sync + 'static,
    ) -> Self {
        self.on_booking_update = Some(Arc::new(f));
        self
    }

    fn emit_notification(&self, notification: &Notification) {
        if let Some(cb) = &self.on_notification {
            cb(notification);
        }
    }

    fn emit_shift_update(&self, payload: &Value) {
        if let Some(cb) = &self.on_shift_update {
            cb(payload);
        }
    }

    fn emit_booking_update(&self, update: &BookingUpdate) {
        if let Some(cb) = &self.on_booking_update {
            cb(update);
        }
    }
}

/// What the router did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Notification { notification_id: String },
    Heartbeat,
    ShiftUpdate,
    /// `applied` is the value written to the pending-clinic sink, if any.
    ClinicCounter { applied: Option<u64> },
    BookingUpdate,
    Dropped,
}

/// Routes decoded frames to the presenter, the counter sinks and the
/// consumer callbacks.
///
/// Frames are handled one at a time in delivery order. Nothing is deduplicated
/// here: a notification redelivered after a reconnect is counted and shown
/// again, and consumers deduplicate by identifier.
pub struct Router {
    presenter: Presenter,
    counters: Counters,
    callbacks: Callbacks,
    log_heartbeats: bool,
}

impl Router {
    pub fn new(presenter: Presenter, counters: Counters, callbacks: Callbacks) -> Self {
        Self {
            presenter,
            counters,
            callbacks,
            log_heartbeats: false,
        }
    }

    /// Log a liveness line for every heartbeat (development builds).
    pub fn log_heartbeats(mut self, enabled: bool) -> Self {
        self.log_heartbeats = enabled;
        self
    }

    /// Replaces the callbacks; the next frame is dispatched to the new set.
    pub fn set_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    /// Parses and dispatches one frame body. Never fails: bad frames are
    /// logged and dropped.
    pub fn handle(&self, body: &str) -> Dispatch {
        match parse_frame(body) {
            Ok(envelope) => self.dispatch(envelope),
            Err(e) => {
                match &e.error_kind {
                    ErrorKind::Frame(FrameErrorKind::UnknownKind(kind)) => {
                        info!("Ignoring push event with unknown type {kind}");
                    }
                    _ => warn!("Dropping unreadable push frame: {e}"),
                }
                Dispatch::Dropped
            }
        }
    }

    pub fn dispatch(&self, envelope: Envelope) -> Dispatch {
        trace!(
            "Dispatching {} event (timestamp {:?})",
            envelope.event.event_type(),
            envelope.timestamp
        );

        match envelope.event {
            Event::Notification(notification) => {
                debug!(
                    "Received notification {} ({:?})",
                    notification.notification_id, notification.category
                );
                self.counters.unread.increment();
                self.presenter.present(&notification);
                self.callbacks.emit_notification(&notification);

                Dispatch::Notification {
                    notification_id: notification.notification_id,
                }
            }

            Event::Heartbeat => {
                if self.log_heartbeats {
                    debug!("Heartbeat received at {:?}", envelope.timestamp);
                }
                Dispatch::Heartbeat
            }

            Event::ShiftUpdate(payload) => {
                debug!("Received shift update");
                self.callbacks.emit_shift_update(&payload);
                Dispatch::ShiftUpdate
            }

            Event::ClinicCounterUpdate(Some(count)) => {
                debug!("Pending clinic count is now {count}");
                self.counters.pending_clinics.set(count);
                Dispatch::ClinicCounter {
                    applied: Some(count),
                }
            }

            Event::ClinicCounterUpdate(None) => {
                warn!("Ignoring clinic counter update with a non-numeric payload");
                Dispatch::ClinicCounter { applied: None }
            }

            Event::BookingUpdate(update) => {
                debug!(
                    "Received booking update {} ({:?})",
                    update.booking_code, update.action
                );
                self.callbacks.emit_booking_update(&update);
                Dispatch::BookingUpdate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::Severity;
    use crate::testing::RecordingToasts;
    use events::BookingAction;
    use std::sync::Mutex;

    struct Fixture {
        router: Router,
        toasts: Arc<RecordingToasts>,
        counters: Counters,
        seen: Arc<Mutex<Vec<String>>>,
    }

    fn fixture() -> Fixture {
        let toasts = Arc::new(RecordingToasts::default());
        let counters = Counters::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let callbacks = {
            let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
            Callbacks::new()
                .on_notification(move |n| {
                    a.lock().unwrap().push(format!("notification:{}", n.notification_id))
                })
                .on_shift_update(move |payload| {
                    b.lock().unwrap().push(format!("shift:{}", payload["shiftId"]))
                })
                .on_booking_update(move |update| {
                    c.lock().unwrap().push(format!("booking:{}", update.booking_code))
                })
        };

        let router = Router::new(
            Presenter::new(toasts.clone()),
            counters.clone(),
            callbacks,
        );

        Fixture {
            router,
            toasts,
            counters,
            seen,
        }
    }

    const APPROVED: &str = r#"{"type":"NOTIFICATION","data":{"notificationId":"n1","type":"APPROVED","message":"ok","read":false,"createdAt":"2024-01-01T00:00:00Z"},"timestamp":"2024-01-01T00:00:00Z"}"#;

    #[test]
    fn test_approved_notification_toasts_counts_and_calls_back() {
        let f = fixture();
        f.counters.unread.set(4);

        let outcome = f.router.handle(APPROVED);

        assert_eq!(
            outcome,
            Dispatch::Notification {
                notification_id: "n1".to_string()
            }
        );
        assert_eq!(f.toasts.calls(), vec![(Severity::Success, "ok".to_string())]);
        assert_eq!(f.counters.unread.value(), 5);
        assert_eq!(*f.seen.lock().unwrap(), vec!["notification:n1".to_string()]);
    }

    #[test]
    fn test_redelivered_notification_is_not_deduplicated() {
        let f = fixture();
        f.router.handle(APPROVED);
        f.router.handle(APPROVED);

        assert_eq!(f.toasts.calls().len(), 2);
        assert_eq!(f.counters.unread.value(), 2);
    }

    #[test]
    fn test_unknown_type_mutates_nothing() {
        let f = fixture();
        let outcome = f.router.handle(r#"{"type":"CHAT_MESSAGE","data":{"text":"hi"}}"#);

        assert_eq!(outcome, Dispatch::Dropped);
        assert_eq!(f.counters.unread.value(), 0);
        assert_eq!(f.counters.pending_clinics.value(), 0);
        assert!(f.toasts.calls().is_empty());
        assert!(f.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let f = fixture();
        assert_eq!(f.router.handle("{not json"), Dispatch::Dropped);
        assert!(f.toasts.calls().is_empty());
    }

    #[test]
    fn test_heartbeat_has_no_side_effects() {
        let f = fixture();
        let router = f.router.log_heartbeats(true);
        assert_eq!(
            router.handle(r#"{"type":"HEARTBEAT","data":null}"#),
            Dispatch::Heartbeat
        );
        assert_eq!(f.counters.unread.value(), 0);
        assert!(f.toasts.calls().is_empty());
        assert!(f.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clinic_counter_numeric_sets_absolute_value() {
        let f = fixture();
        f.counters.pending_clinics.set(10);

        let outcome = f
            .router
            .handle(r#"{"type":"CLINIC_COUNTER_UPDATE","data":3}"#);

        assert_eq!(outcome, Dispatch::ClinicCounter { applied: Some(3) });
        assert_eq!(f.counters.pending_clinics.value(), 3);
    }

    #[test]
    fn test_clinic_counter_non_numeric_is_ignored() {
        let f = fixture();
        f.counters.pending_clinics.set(10);

        let outcome = f
            .router
            .handle(r#"{"type":"CLINIC_COUNTER_UPDATE","data":{"count":3}}"#);

        assert_eq!(outcome, Dispatch::ClinicCounter { applied: None });
        assert_eq!(f.counters.pending_clinics.value(), 10);
    }

    #[test]
    fn test_shift_update_passes_raw_payload() {
        let f = fixture();
        let outcome = f
            .router
            .handle(r#"{"type":"SHIFT_UPDATE","data":{"shiftId":"s7"}}"#);

        assert_eq!(outcome, Dispatch::ShiftUpdate);
        assert_eq!(*f.seen.lock().unwrap(), vec![r#"shift:"s7""#.to_string()]);
        assert_eq!(f.counters.unread.value(), 0);
    }

    #[test]
    fn test_booking_update_reaches_callback() {
        let f = fixture();
        let outcome = f.router.handle(
            r#"{"type":"BOOKING_UPDATE","data":{"bookingId":"b1","bookingCode":"BK-9","action":"SERVICE_ADDED","status":"CONFIRMED"}}"#,
        );

        assert_eq!(outcome, Dispatch::BookingUpdate);
        assert_eq!(*f.seen.lock().unwrap(), vec!["booking:BK-9".to_string()]);
    }

    #[test]
    fn test_missing_callbacks_are_fine() {
        let toasts = Arc::new(RecordingToasts::default());
        let counters = Counters::default();
        let router = Router::new(Presenter::new(toasts.clone()), counters.clone(), Callbacks::new());

        router.handle(APPROVED);
        router.handle(r#"{"type":"SHIFT_UPDATE","data":null}"#);

        assert_eq!(counters.unread.value(), 1);
        assert_eq!(toasts.calls().len(), 1);
    }

    #[test]
    fn test_set_callbacks_takes_effect_for_next_frame() {
        let mut f = fixture();
        let replaced = Arc::new(Mutex::new(Vec::new()));
        let sink = replaced.clone();

        f.router.set_callbacks(Callbacks::new().on_booking_update(move |update| {
            sink.lock().unwrap().push(update.action)
        }));
        f.router.handle(
            r#"{"type":"BOOKING_UPDATE","data":{"bookingId":"b1","bookingCode":"BK-9","action":"COMPLETED","status":"COMPLETED"}}"#,
        );

        assert!(f.seen.lock().unwrap().is_empty());
        assert_eq!(*replaced.lock().unwrap(), vec![BookingAction::Completed]);
    }

    #[test]
    fn test_booking_update_with_new_action_still_calls_back() {
        let mut f = fixture();
        let actions = Arc::new(Mutex::new(Vec::new()));
        let sink = actions.clone();

        f.router.set_callbacks(Callbacks::new().on_booking_update(move |update| {
            sink.lock()
                .unwrap()
                .push((update.booking_code.clone(), update.action))
        }));
        f.router.handle(
            r#"{"type":"BOOKING_UPDATE","data":{"bookingId":"b2","bookingCode":"BK-10","action":"RESCHEDULED","status":"CONFIRMED"}}"#,
        );

        assert_eq!(
            *actions.lock().unwrap(),
            vec![("BK-10".to_string(), BookingAction::Unknown)]
        );
    }
}
