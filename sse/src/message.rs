use crate::error::{frame_error, Error, ErrorKind, FrameErrorKind};
use events::{BookingUpdate, Notification};
use serde::Deserialize;
use serde_json::Value;

/// Trait for getting the wire tag of an event kind
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// A decoded push event. Exactly one kind per frame; the payload shape is
/// fixed by the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Notification(Notification),
    Heartbeat,
    /// Raw shift payload, passed through to consumers untouched.
    ShiftUpdate(Value),
    /// Pending clinic count; `None` when the payload was not a non-negative
    /// integer.
    ClinicCounterUpdate(Option<u64>),
    BookingUpdate(BookingUpdate),
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Notification(_) => "NOTIFICATION",
            Event::Heartbeat => "HEARTBEAT",
            Event::ShiftUpdate(_) => "SHIFT_UPDATE",
            Event::ClinicCounterUpdate(_) => "CLINIC_COUNTER_UPDATE",
            Event::BookingUpdate(_) => "BOOKING_UPDATE",
        }
    }
}

/// An event together with the frame's timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: Event,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Decodes a frame body.
///
/// Fails with `Malformed` for bodies that are not a JSON object with a string
/// `type`, `UnknownKind` for tags outside the known set and `InvalidPayload`
/// when the payload does not fit its kind.
pub fn parse_frame(body: &str) -> Result<Envelope, Error> {
    let raw: RawFrame = serde_json::from_str(body)?;

    let event = match raw.kind.as_str() {
        "NOTIFICATION" => Event::Notification(payload(&raw.kind, raw.data)?),
        "HEARTBEAT" => Event::Heartbeat,
        "SHIFT_UPDATE" => Event::ShiftUpdate(raw.data),
        "CLINIC_COUNTER_UPDATE" => Event::ClinicCounterUpdate(raw.data.as_u64()),
        "BOOKING_UPDATE" => Event::BookingUpdate(payload(&raw.kind, raw.data)?),
        other => return Err(frame_error(FrameErrorKind::UnknownKind(other.to_string()))),
    };

    Ok(Envelope {
        event,
        timestamp: raw.timestamp,
    })
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::Frame(FrameErrorKind::InvalidPayload(kind.to_string())),
    })
}
