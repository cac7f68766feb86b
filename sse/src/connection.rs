use crate::error::{Error, ErrorKind, TransportErrorKind};
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use std::fmt;
use tokio::sync::mpsc;
use url::Url;

/// Path of the push endpoint relative to the API base URL.
pub const SUBSCRIBE_PATH: &str = "sse/subscribe";

/// Unique identifier for a transport instance (client-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportId(String);

impl TransportId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that happened on a transport, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    /// A frame, with the SSE event name (`message` when unnamed) and its body.
    Message { event_type: String, data: String },
    Error(String),
}

/// A live push connection.
///
/// Events arrive on an ordered channel. Dropping the transport closes it;
/// anything still in flight is discarded.
pub struct Transport {
    id: TransportId,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Transport {
    pub fn new(
        events: mpsc::UnboundedReceiver<TransportEvent>,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id: TransportId::new(),
            events,
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn id(&self) -> &TransportId {
        &self.id
    }

    /// Next event; `None` once the producer side has gone away.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn close(self) {
        debug!("Closing transport {}", self.id);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").field("id", &self.id).finish()
    }
}

/// Opens push transports. The production implementation is
/// [`EventSourceConnector`]; tests script their own.
pub trait Connector: Send + Sync {
    fn open(&self, url: &Url) -> Result<Transport, Error>;
}

/// Builds `<base>/sse/subscribe?token=<credential>`.
pub fn subscribe_url(base_url: &str, credential: &str) -> Result<Url, Error> {
    let mut url = Url::parse(&format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        SUBSCRIBE_PATH
    ))?;
    url.query_pairs_mut().append_pair("token", credential);
    Ok(url)
}

/// Strips the credential from a subscribe URL so it can be logged.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Push transport backed by `eventsource-client`.
///
/// The client's own retry loop is disabled: reconnection is owned by the
/// reconnect policy so attempts can be counted and cancelled. `Open` is
/// reported once the response headers arrive, before any frame. A transport
/// ends with exactly one `Error`.
#[derive(Debug, Default, Clone)]
pub struct EventSourceConnector;

impl EventSourceConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for EventSourceConnector {
    fn open(&self, url: &Url) -> Result<Transport, Error> {
        let client = es::ClientBuilder::for_url(url.as_str())
            .map_err(|e| {
                Error::with_source(
                    ErrorKind::Transport(TransportErrorKind::Connect),
                    format!("{e:?}"),
                )
            })?
            .header("Accept", "text/event-stream")
            .map_err(|e| {
                Error::with_source(
                    ErrorKind::Transport(TransportErrorKind::Connect),
                    format!("{e:?}"),
                )
            })?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let (tx, rx) = mpsc::unbounded_channel();
        let target = redacted(url);

        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                let event = match stream.next().await {
                    Some(Ok(es::SSE::Connected(_))) => {
                        debug!("Push stream connected to {}", target);
                        TransportEvent::Open
                    }
                    Some(Ok(es::SSE::Event(event))) => TransportEvent::Message {
                        event_type: event.event_type,
                        data: event.data,
                    },
                    // Keep-alive
                    Some(Ok(es::SSE::Comment(_))) => continue,
                    Some(Err(e)) => TransportEvent::Error(format!("{e:?}")),
                    None => TransportEvent::Error("stream ended".to_string()),
                };

                let terminal = matches!(event, TransportEvent::Error(_));
                if tx.send(event).is_err() {
                    debug!("Transport receiver dropped for {}", target);
                    break;
                }
                if terminal {
                    break;
                }
            }
        });

        Ok(Transport::new(rx, move || handle.abort()))
    }
}
