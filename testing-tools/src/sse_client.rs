use anyhow::{bail, Result};
use log::*;
use serde_json::Value;
use sse::connection::{subscribe_url, Connector, EventSourceConnector, Transport, TransportEvent};
use sse::message::{parse_frame, Envelope};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Event {
    /// The frame's `type` tag, or the SSE event name when the body is not JSON.
    pub kind: String,
    pub data: Value,
    pub envelope: Option<Envelope>,
    pub timestamp: Instant,
}

impl Event {
    fn from_frame(event_type: String, body: &str) -> Self {
        let data: Value = serde_json::from_str(body).unwrap_or(Value::String(body.to_string()));
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(event_type);

        Self {
            kind,
            envelope: parse_frame(body).ok(),
            data,
            timestamp: Instant::now(),
        }
    }
}

/// Outcome of waiting for the next transport event.
#[derive(Debug)]
pub enum Next {
    Opened,
    Frame(Event),
    /// Nothing arrived before the timeout.
    Idle,
}

/// A single push connection driven directly, without the reconnect policy.
pub struct Connection {
    pub label: String,
    transport: Transport,
    opened: bool,
}

impl Connection {
    pub fn establish(base_url: &str, token: &str, label: String) -> Result<Self> {
        let url = subscribe_url(base_url, token)?;
        let transport = EventSourceConnector::new().open(&url)?;
        debug!("{} opened transport {}", label, transport.id());

        Ok(Self {
            label,
            transport,
            opened: false,
        })
    }

    /// Waits for the first sign of life from the stream.
    pub async fn wait_for_open(&mut self, timeout: Duration) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        match self.next(timeout).await? {
            Next::Opened => Ok(()),
            Next::Frame(event) => bail!("Received {} frame before the stream opened", event.kind),
            Next::Idle => bail!("Stream did not open within {:?}", timeout),
        }
    }

    pub async fn wait_for_event(&mut self, kind: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("Timeout waiting for event: {}", kind);
            }

            match self.next(remaining).await? {
                Next::Frame(event) if event.kind == kind => return Ok(event),
                Next::Frame(event) => trace!("{} skipping {} event", self.label, event.kind),
                Next::Opened | Next::Idle => {}
            }
        }
    }

    /// Waits up to `timeout` for the next transport event. Errors mean the
    /// connection is gone.
    pub async fn next(&mut self, timeout: Duration) -> Result<Next> {
        match tokio::time::timeout(timeout, self.transport.next_event()).await {
            Ok(Some(TransportEvent::Open)) => {
                self.opened = true;
                Ok(Next::Opened)
            }
            Ok(Some(TransportEvent::Message { event_type, data })) => {
                Ok(Next::Frame(Event::from_frame(event_type, &data)))
            }
            Ok(Some(TransportEvent::Error(reason))) => bail!("SSE connection failed: {}", reason),
            Ok(None) => bail!("SSE connection closed"),
            Err(_) => Ok(Next::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse::message::Event as PushEvent;

    #[test]
    fn test_event_kind_comes_from_frame_tag() {
        let event = Event::from_frame(
            "message".to_string(),
            r#"{"type":"CLINIC_COUNTER_UPDATE","data":4}"#,
        );

        assert_eq!(event.kind, "CLINIC_COUNTER_UPDATE");
        assert_eq!(
            event.envelope.map(|e| e.event),
            Some(PushEvent::ClinicCounterUpdate(Some(4)))
        );
    }

    #[test]
    fn test_non_json_body_keeps_sse_event_name() {
        let event = Event::from_frame("ping".to_string(), "keepalive");

        assert_eq!(event.kind, "ping");
        assert_eq!(event.data, Value::String("keepalive".to_string()));
        assert!(event.envelope.is_none());
    }
}
