//! Scriptable collaborators for exercising the notification core without a
//! network: a connector whose transports are driven by the test, a toast sink
//! that records calls and count sources with fixed results.

use crate::connection::{Connector, Transport, TransportEvent};
use crate::counter::CountSource;
use crate::error::{refresh_error, Error, ErrorKind, TransportErrorKind};
use crate::presenter::{Severity, ToastSink};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use url::Url;

/// Test side of a transport opened by [`MockConnector`].
#[derive(Debug, Clone)]
pub struct MockTransport {
    url: String,
    tx: mpsc::UnboundedSender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        let _ = self.tx.send(TransportEvent::Open);
    }

    pub fn message(&self, data: &str) {
        let _ = self.tx.send(TransportEvent::Message {
            event_type: "message".to_string(),
            data: data.to_string(),
        });
    }

    pub fn error(&self, reason: &str) {
        let _ = self.tx.send(TransportEvent::Error(reason.to_string()));
    }
}

/// Connector that hands every opened transport to the test.
#[derive(Debug, Default)]
pub struct MockConnector {
    transports: Mutex<Vec<MockTransport>>,
    fail_next: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `open` fail as if the endpoint were unreachable.
    pub fn fail_next_open(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of transports opened so far.
    pub fn opened(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    /// Number of opened transports not yet closed.
    pub fn live(&self) -> usize {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.is_closed())
            .count()
    }

    pub fn transport(&self, index: usize) -> MockTransport {
        self.transports.lock().unwrap()[index].clone()
    }

    pub fn last(&self) -> Option<MockTransport> {
        self.transports.lock().unwrap().last().cloned()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &Url) -> Result<Transport, Error> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::with_source(
                ErrorKind::Transport(TransportErrorKind::Connect),
                "connection refused",
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();

        self.transports.lock().unwrap().push(MockTransport {
            url: url.to_string(),
            tx,
            closed,
        });

        Ok(Transport::new(rx, move || flag.store(true, Ordering::SeqCst)))
    }
}

/// Toast sink that remembers every call.
#[derive(Debug, Default)]
pub struct RecordingToasts {
    calls: Mutex<Vec<(Severity, String)>>,
}

impl RecordingToasts {
    pub fn calls(&self) -> Vec<(Severity, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToastSink for RecordingToasts {
    fn display(&self, severity: Severity, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

/// Count source returning a fixed value, optionally held until
/// [`FixedCount::release`] is called.
#[derive(Debug, Default)]
pub struct FixedCount {
    value: u64,
    calls: AtomicUsize,
    gate: Option<Notify>,
}

impl FixedCount {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn gated(value: u64) -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new(value)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CountSource for FixedCount {
    async fn fetch_count(&self) -> Result<u64, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.value)
    }
}

/// Count source that always fails.
#[derive(Debug, Default)]
pub struct FailingCount;

#[async_trait]
impl CountSource for FailingCount {
    async fn fetch_count(&self) -> Result<u64, Error> {
        Err(refresh_error("backend unavailable"))
    }
}
