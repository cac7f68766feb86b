use crate::connection::{redacted, subscribe_url, Connector, Transport};
use crate::reconnect::{Decision, ReconnectOptions, ReconnectPolicy};
use crate::session::SessionReader;
use log::*;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Open => write!(f, "open"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

/// Observable connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: LifecycleState,
    pub reconnect_attempts: u32,
    pub reconnect_pending: bool,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == LifecycleState::Open
    }
}

/// Owns the single push transport.
///
/// At most one transport is live at any time: every `connect()` drops the
/// previous one before opening the next, and events are only read from the
/// current one. The manager never sleeps; it exposes the reconnect deadline and
/// the supervisor calls [`ConnectionManager::fire_reconnect`] when it passes.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    base_url: String,
    session: SessionReader,
    policy: ReconnectPolicy,
    transport: Option<Transport>,
    state: LifecycleState,
    status: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        base_url: impl Into<String>,
        session: SessionReader,
        reconnect: ReconnectOptions,
    ) -> Self {
        Self {
            connector,
            base_url: base_url.into(),
            session,
            policy: ReconnectPolicy::new(reconnect),
            transport: None,
            state: LifecycleState::Idle,
            status: watch::Sender::new(ConnectionStatus::default()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LifecycleState::Open
    }

    /// True while a transport exists (connecting or open).
    pub fn is_live(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport_mut(&mut self) -> Option<&mut Transport> {
        self.transport.as_mut()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.policy.pending()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Opens a transport under the current credential, replacing any existing
    /// one. Without a valid session this is a no-op.
    pub fn connect(&mut self) {
        let session = self.session.current();
        let Some(credential) = session.credential() else {
            warn!("Not connecting to push endpoint: no valid session");
            return;
        };

        let url = match subscribe_url(&self.base_url, credential) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build subscribe URL from {}: {e}", self.base_url);
                return;
            }
        };

        self.policy.cancel();
        self.close_transport();

        match self.connector.open(&url) {
            Ok(transport) => {
                info!("Opening push connection {} to {}", transport.id(), redacted(&url));
                self.transport = Some(transport);
                self.state = LifecycleState::Connecting;
            }
            Err(e) => {
                // Handled like any other transport failure
                warn!("Failed to open push connection: {e}");
                self.state = LifecycleState::Closed;
                self.schedule_retry();
            }
        }
        self.publish();
    }

    /// Cancels any pending retry and closes the transport.
    pub fn disconnect(&mut self) {
        self.policy.cancel();
        self.policy.reset();
        if self.close_transport() {
            info!("Disconnected from push endpoint");
        }
        if self.state != LifecycleState::Idle {
            self.state = LifecycleState::Closed;
        }
        self.publish();
    }

    /// Disconnects and connects again immediately, with a fresh attempt budget.
    pub fn reconnect(&mut self) {
        debug!("Manual reconnect requested");
        self.disconnect();
        self.connect();
    }

    /// The current transport reported a successful open.
    pub fn handle_open(&mut self) {
        if self.transport.is_none() {
            return;
        }
        info!("Push connection open");
        self.state = LifecycleState::Open;
        self.policy.reset();
        self.publish();
    }

    /// The current transport failed or ended. Closes it and applies the
    /// reconnect policy.
    pub fn handle_error(&mut self, reason: &str) {
        if self.transport.is_none() {
            return;
        }
        warn!("Push connection error: {reason}");
        self.close_transport();
        self.state = LifecycleState::Closed;
        self.schedule_retry();
        self.publish();
    }

    /// Runs the scheduled attempt if its deadline has passed.
    pub fn fire_reconnect(&mut self, now: Instant) {
        if self.policy.take_due(now) {
            debug!(
                "Reconnect timer fired (attempt {})",
                self.policy.attempts()
            );
            self.connect();
        }
    }

    fn schedule_retry(&mut self) {
        let decision = self
            .policy
            .on_transport_error(self.session.has_valid_session(), Instant::now());
        if let Decision::Exhausted { attempts } = decision {
            warn!("Giving up on push connection after {attempts} reconnect attempts");
        }
    }

    fn close_transport(&mut self) -> bool {
        match self.transport.take() {
            Some(transport) => {
                transport.close();
                true
            }
            None => false,
        }
    }

    fn publish(&self) {
        self.status.send_replace(ConnectionStatus {
            state: self.state,
            reconnect_attempts: self.policy.attempts(),
            reconnect_pending: self.policy.pending().is_some(),
        });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close_transport();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CredentialSource;
    use crate::testing::MockConnector;
    use std::time::Duration;

    fn manager(
        credentials: &CredentialSource,
        connector: &Arc<MockConnector>,
        max_attempts: u32,
    ) -> ConnectionManager {
        ConnectionManager::new(
            connector.clone(),
            "https://api.example.com/api",
            credentials.reader(),
            ReconnectOptions {
                delay: Duration::from_millis(100),
                max_attempts,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_connect_without_session_is_noop() {
        let credentials = CredentialSource::new();
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();

        assert_eq!(connector.opened(), 0);
        assert_eq!(manager.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_connect_uses_current_token() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();

        assert_eq!(connector.opened(), 1);
        assert!(connector.transport(0).url().contains("token=tok-A"));
        assert_eq!(manager.state(), LifecycleState::Connecting);
    }

    #[tokio::test]
    async fn test_repeated_connect_keeps_single_live_transport() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        manager.connect();
        manager.reconnect();

        assert_eq!(connector.opened(), 3);
        assert_eq!(connector.live(), 1);
        assert!(connector.transport(0).is_closed());
        assert!(connector.transport(1).is_closed());
        assert!(!connector.transport(2).is_closed());
    }

    #[tokio::test]
    async fn test_open_resets_attempts_and_marks_connected() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        manager.handle_error("refused");
        assert_eq!(manager.reconnect_attempts(), 1);

        manager.fire_reconnect(Instant::now() + Duration::from_millis(100));
        manager.handle_open();

        assert!(manager.is_connected());
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(manager.status().is_connected());
    }

    #[tokio::test]
    async fn test_error_closes_transport_and_schedules_retry() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        manager.handle_open();
        manager.handle_error("reset by peer");

        assert_eq!(manager.state(), LifecycleState::Closed);
        assert!(!manager.is_live());
        assert!(connector.transport(0).is_closed());
        assert!(manager.reconnect_deadline().is_some());
        assert!(manager.status().reconnect_pending);
    }

    #[tokio::test]
    async fn test_timer_before_deadline_does_nothing() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        manager.handle_error("refused");
        manager.fire_reconnect(Instant::now());

        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_bounded_reconnection() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        for _ in 0..3 {
            manager.handle_error("refused");
            manager.fire_reconnect(Instant::now() + Duration::from_secs(1));
        }
        assert_eq!(connector.opened(), 4);

        manager.handle_error("refused");
        assert_eq!(manager.reconnect_deadline(), None);
        manager.fire_reconnect(Instant::now() + Duration::from_secs(1));
        assert_eq!(connector.opened(), 4);
    }

    #[tokio::test]
    async fn test_no_retry_after_session_invalidated() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        credentials.sign_out();
        manager.handle_error("unauthorized");

        assert_eq!(manager.reconnect_deadline(), None);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_mid_backoff_cancels_timer() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();
        manager.handle_error("refused");
        manager.disconnect();

        assert_eq!(manager.reconnect_deadline(), None);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(!manager.is_connected());
        manager.fire_reconnect(Instant::now() + Duration::from_secs(1));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_manual_reconnect_ignores_exhausted_budget() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 1);

        manager.connect();
        manager.handle_error("refused");
        manager.fire_reconnect(Instant::now() + Duration::from_secs(1));
        manager.handle_error("refused");
        assert_eq!(manager.reconnect_deadline(), None);

        manager.reconnect();

        assert_eq!(connector.opened(), 3);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(manager.is_live());
    }

    #[tokio::test]
    async fn test_failed_open_goes_through_retry_path() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        connector.fail_next_open();
        let mut manager = manager(&credentials, &connector, 3);

        manager.connect();

        assert_eq!(manager.state(), LifecycleState::Closed);
        assert_eq!(manager.reconnect_attempts(), 1);
        assert!(manager.reconnect_deadline().is_some());
    }

    #[tokio::test]
    async fn test_status_subscribers_see_transitions() {
        let credentials = CredentialSource::new();
        credentials.sign_in("tok-A");
        let connector = MockConnector::new();
        let mut manager = manager(&credentials, &connector, 3);
        let status = manager.subscribe_status();

        manager.connect();
        assert_eq!(status.borrow().state, LifecycleState::Connecting);

        manager.handle_open();
        assert!(status.borrow().is_connected());

        manager.disconnect();
        assert_eq!(status.borrow().state, LifecycleState::Closed);
    }
}
