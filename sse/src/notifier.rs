use crate::connection::{Connector, EventSourceConnector, TransportEvent};
use crate::counter::Counters;
use crate::error::{Error, ErrorKind};
use crate::manager::{ConnectionManager, ConnectionStatus};
use crate::presenter::{LogToastSink, Presenter, ToastSink};
use crate::reconnect::ReconnectOptions;
use crate::router::{Callbacks, Router};
use crate::session::{Session, SessionReader};
use log::*;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Per-instance configuration of the notifier.
#[derive(Debug, Clone)]
pub struct Options {
    /// API base URL; the push endpoint is `<base_url>/sse/subscribe`.
    pub base_url: String,
    pub reconnect: ReconnectOptions,
    /// Log every heartbeat; meant for development builds.
    pub log_heartbeats: bool,
}

impl Options {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reconnect: ReconnectOptions::default(),
            log_heartbeats: false,
        }
    }
}

enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    Reconnect(oneshot::Sender<()>),
    SetCallbacks(Callbacks, oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

pub struct NotifierBuilder {
    options: Options,
    connector: Option<Arc<dyn Connector>>,
    session: Option<SessionReader>,
    counters: Counters,
    toasts: Option<Arc<dyn ToastSink>>,
    callbacks: Callbacks,
}

impl NotifierBuilder {
    /// Transport factory; defaults to [`EventSourceConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Required: the credential the connection follows.
    pub fn session(mut self, session: SessionReader) -> Self {
        self.session = Some(session);
        self
    }

    pub fn counters(mut self, counters: Counters) -> Self {
        self.counters = counters;
        self
    }

    /// Toast sink; defaults to [`LogToastSink`].
    pub fn toasts(mut self, toasts: Arc<dyn ToastSink>) -> Self {
        self.toasts = Some(toasts);
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Starts the supervisor task. Must be called within a tokio runtime.
    pub fn spawn(self) -> Result<Notifier, Error> {
        let session = self.session.ok_or_else(|| {
            Error::new(ErrorKind::Config(
                "a session reader is required to start the notifier".to_string(),
            ))
        })?;
        if self.options.base_url.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "base URL must not be empty".to_string(),
            )));
        }

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(EventSourceConnector::new()));
        let toasts = self.toasts.unwrap_or_else(|| Arc::new(LogToastSink));

        let manager = ConnectionManager::new(
            connector,
            self.options.base_url.clone(),
            session.clone(),
            self.options.reconnect,
        );
        let status = manager.subscribe_status();
        let router = Router::new(
            Presenter::new(toasts),
            self.counters.clone(),
            self.callbacks,
        )
        .log_heartbeats(self.options.log_heartbeats);

        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor {
            manager,
            router,
            counters: self.counters.clone(),
            session_rx: session.watch(),
            session,
            session_open: true,
            was_valid: false,
            refresh: None,
            commands: rx,
        };
        let task = tokio::spawn(supervisor.run());

        Ok(Notifier {
            commands: tx,
            status,
            counters: self.counters,
            task: Some(task),
        })
    }
}

/// Handle to the running notification core.
///
/// Connection state lives on a single supervisor task; this handle only sends
/// it commands. Dropping the handle disconnects and stops the task.
pub struct Notifier {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    counters: Counters,
    task: Option<JoinHandle<()>>,
}

impl Notifier {
    pub fn builder(options: Options) -> NotifierBuilder {
        NotifierBuilder {
            options,
            connector: None,
            session: None,
            counters: Counters::default(),
            toasts: None,
            callbacks: Callbacks::default(),
        }
    }

    pub async fn connect(&self) {
        self.request(Command::Connect).await;
    }

    pub async fn disconnect(&self) {
        self.request(Command::Disconnect).await;
    }

    pub async fn reconnect(&self) {
        self.request(Command::Reconnect).await;
    }

    /// Replaces the consumer callbacks without touching the connection.
    pub async fn set_callbacks(&self, callbacks: Callbacks) {
        self.request(|done| Command::SetCallbacks(callbacks, done))
            .await;
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Disconnects and waits for the supervisor task to finish.
    pub async fn shutdown(mut self) {
        self.request(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Notifier task ended abnormally: {e}");
            }
        }
    }

    async fn request(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(command(done)).is_err() {
            debug!("Notifier already stopped");
            return;
        }
        let _ = wait.await;
    }
}

struct Supervisor {
    manager: ConnectionManager,
    router: Router,
    counters: Counters,
    session: SessionReader,
    session_rx: watch::Receiver<Session>,
    session_open: bool,
    was_valid: bool,
    /// Unread refresh started by the latest open.
    refresh: Option<JoinHandle<()>>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Supervisor {
    async fn run(mut self) {
        debug!("Notifier supervisor started");
        self.session_rx.mark_unchanged();
        self.evaluate_session();

        loop {
            let deadline = self.manager.reconnect_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.disconnect();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Notifier handle dropped");
                        self.disconnect();
                        break;
                    }
                },

                changed = self.session_rx.changed(), if self.session_open => match changed {
                    Ok(()) => self.evaluate_session(),
                    Err(_) => {
                        debug!("Credential source dropped, treating as signed out");
                        self.session_open = false;
                        self.was_valid = false;
                        self.disconnect();
                    }
                },

                event = next_transport_event(&mut self.manager) => self.handle_transport_event(event),

                _ = reconnect_timer(deadline) => self.manager.fire_reconnect(Instant::now()),
            }
        }

        debug!("Notifier supervisor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let done = match command {
            Command::Connect(done) => {
                self.manager.connect();
                done
            }
            Command::Disconnect(done) => {
                self.disconnect();
                done
            }
            Command::Reconnect(done) => {
                self.manager.reconnect();
                done
            }
            Command::SetCallbacks(callbacks, done) => {
                self.router.set_callbacks(callbacks);
                done
            }
            Command::Shutdown(done) => done,
        };
        let _ = done.send(());
    }

    /// Applies the lifecycle binding: becoming valid connects, becoming
    /// invalid disconnects. A token change while a connection exists or a
    /// retry is pending is left alone; the next connect picks it up.
    fn evaluate_session(&mut self) {
        let valid = self.session.has_valid_session();

        match (self.was_valid, valid) {
            (false, true) => {
                info!("Session became valid, connecting");
                self.manager.connect();
            }
            (true, false) => {
                info!("Session ended, disconnecting");
                self.disconnect();
            }
            (true, true) => {
                if !self.manager.is_live() && self.manager.reconnect_deadline().is_none() {
                    debug!("Credential changed while disconnected, connecting");
                    self.manager.connect();
                }
            }
            (false, false) => {}
        }

        self.was_valid = valid;
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                self.manager.handle_open();

                self.cancel_refresh();
                let unread = self.counters.unread.clone();
                let session = self.session.clone();
                self.refresh = Some(tokio::spawn(async move { unread.refresh(&session).await }));
            }
            TransportEvent::Message { event_type, data } => {
                trace!("Frame received on '{event_type}'");
                self.router.handle(&data);
            }
            TransportEvent::Error(reason) => self.manager.handle_error(&reason),
        }
    }

    /// Closes the connection and stops any refresh it started, so nothing
    /// writes the counters once the connection is gone.
    fn disconnect(&mut self) {
        self.cancel_refresh();
        self.manager.disconnect();
    }

    fn cancel_refresh(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            if !refresh.is_finished() {
                refresh.abort();
                self.counters.unread.cancel_loading();
                debug!("Cancelled in-flight unread refresh");
            }
        }
    }
}

async fn next_transport_event(manager: &mut ConnectionManager) -> TransportEvent {
    match manager.transport_mut() {
        Some(transport) => transport
            .next_event()
            .await
            .unwrap_or_else(|| TransportEvent::Error("transport closed".to_string())),
        None => pending().await,
    }
}

async fn reconnect_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}
