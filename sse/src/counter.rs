//! Counter sinks: shared integer cells behind badges and unread counts.
//!
//! Each sink publishes its state through a `tokio::sync::watch` channel so any
//! number of UI components can observe it. Every synchronous mutation is a
//! single `send_modify`, so it is atomic with respect to other mutations.
//!
//! `refresh()` is authoritative: whatever the backend returns overwrites local
//! optimistic increments. Overlapping refreshes are not sequenced; the one
//! that completes last wins.

use crate::error::Error;
use crate::session::SessionReader;
use async_trait::async_trait;
use log::*;
use std::sync::Arc;
use tokio::sync::watch;

/// Backend endpoint that returns the authoritative value of a counter.
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn fetch_count(&self) -> Result<u64, Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    pub value: u64,
    pub loading: bool,
}

pub struct CounterSink {
    name: String,
    state: watch::Sender<CounterState>,
    source: Option<Arc<dyn CountSource>>,
}

impl CounterSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: watch::Sender::new(CounterState::default()),
            source: None,
        }
    }

    pub fn with_source(name: impl Into<String>, source: Arc<dyn CountSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> u64 {
        self.state.borrow().value
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn snapshot(&self) -> CounterState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CounterState> {
        self.state.subscribe()
    }

    pub fn increment(&self) {
        self.state.send_modify(|state| state.value = state.value.saturating_add(1));
        trace!("{} incremented to {}", self.name, self.value());
    }

    pub fn decrement(&self) {
        self.state.send_modify(|state| state.value = state.value.saturating_sub(1));
        trace!("{} decremented to {}", self.name, self.value());
    }

    pub fn set(&self, value: u64) {
        self.state.send_modify(|state| state.value = value);
        trace!("{} set to {}", self.name, value);
    }

    pub fn reset(&self) {
        self.set(0);
    }

    /// Clears the loading flag left behind by a refresh that was cancelled
    /// before it resolved.
    pub fn cancel_loading(&self) {
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }

    /// Fetches the authoritative value from the backend.
    ///
    /// On failure the last known value is kept. A result that arrives after
    /// the session has become invalid is discarded.
    pub async fn refresh(&self, session: &SessionReader) {
        let Some(source) = self.source.clone() else {
            debug!("{} has no count source, skipping refresh", self.name);
            return;
        };

        self.state.send_modify(|state| state.loading = true);

        match source.fetch_count().await {
            Ok(value) if session.has_valid_session() => {
                debug!("{} refreshed to {}", self.name, value);
                self.state.send_modify(|state| {
                    state.value = value;
                    state.loading = false;
                });
            }
            Ok(_) => {
                debug!(
                    "Discarding {} refresh result: session ended while in flight",
                    self.name
                );
                self.state.send_modify(|state| state.loading = false);
            }
            Err(e) => {
                warn!("Failed to refresh {}: {e}", self.name);
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }
}

impl std::fmt::Debug for CounterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterSink")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// The sinks the router mutates.
#[derive(Debug, Clone)]
pub struct Counters {
    /// Global unread-notification count.
    pub unread: Arc<CounterSink>,
    /// Clinics waiting for admin approval.
    pub pending_clinics: Arc<CounterSink>,
}

impl Counters {
    pub fn new(
        unread_source: Option<Arc<dyn CountSource>>,
        pending_clinics_source: Option<Arc<dyn CountSource>>,
    ) -> Self {
        Self {
            unread: Arc::new(sink("unread_notifications", unread_source)),
            pending_clinics: Arc::new(sink("pending_clinics", pending_clinics_source)),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn sink(name: &str, source: Option<Arc<dyn CountSource>>) -> CounterSink {
    match source {
        Some(source) => CounterSink::with_source(name, source),
        None => CounterSink::new(name),
    }
}
