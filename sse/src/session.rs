//! Credential source consumed by the notification core.
//!
//! Token storage and refresh live elsewhere; this module only models what the
//! core needs from them: the current bearer credential and whether the user is
//! authenticated. Both are published through a `tokio::sync::watch` channel so
//! every reader always sees the latest value instead of one captured earlier.

use tokio::sync::watch;

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub authenticated: bool,
}

impl Session {
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            authenticated: true,
        }
    }

    /// Both flags must hold for the push connection to be allowed.
    pub fn has_valid_session(&self) -> bool {
        self.authenticated && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The bearer credential, only when the session is valid.
    pub fn credential(&self) -> Option<&str> {
        if self.has_valid_session() {
            self.token.as_deref()
        } else {
            None
        }
    }
}

/// Owning side of the credential state. Held by whatever performs login,
/// token refresh and logout.
#[derive(Debug)]
pub struct CredentialSource {
    tx: watch::Sender<Session>,
}

impl CredentialSource {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(Session::default()),
        }
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        self.publish(Session::authenticated(token));
    }

    /// Replaces the token of an authenticated session. Ignored while signed out.
    pub fn rotate_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.tx.send_if_modified(|session| {
            if !session.authenticated || session.token.as_deref() == Some(token.as_str()) {
                return false;
            }
            session.token = Some(token);
            true
        });
    }

    pub fn sign_out(&self) {
        self.publish(Session::default());
    }

    pub fn publish(&self, session: Session) {
        self.tx.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            *current = session;
            true
        });
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest-value accessor for the session.
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<Session>,
}

impl SessionReader {
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn has_valid_session(&self) -> bool {
        self.rx.borrow().has_valid_session()
    }

    /// A receiver for awaiting changes; used by the supervisor loop.
    pub(crate) fn watch(&self) -> watch::Receiver<Session> {
        self.rx.clone()
    }
}

impl From<watch::Receiver<Session>> for SessionReader {
    fn from(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }
}
