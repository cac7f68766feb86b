//! Real-time notification delivery over Server-Sent Events (SSE).
//!
//! This crate keeps one authenticated push connection to the clinic booking
//! backend open for as long as the user's session is valid, and turns the
//! frames it receives into toasts, counter updates and consumer callbacks.
//!
//! # Architecture
//!
//! - **Single connection per session**: [`ConnectionManager`] owns at most one
//!   live transport. Every connect drops the previous transport first and
//!   frames are only read from the current one.
//! - **Bounded retries**: [`reconnect::ReconnectPolicy`] schedules a fixed
//!   delay (5 s by default) between attempts and gives up after 10. A
//!   successful open resets the budget; a lost session cancels it.
//! - **Lifecycle binding**: the [`Notifier`] supervisor watches the
//!   credential and connects when the session becomes valid, disconnects when
//!   it ends.
//! - **Typed events**: frames are decoded into [`message::Event`] and routed
//!   by [`Router`]. Unknown kinds and malformed frames are logged and dropped.
//!
//! # Frame flow
//!
//! 1. The user signs in; [`session::CredentialSource`] publishes the token
//! 2. The supervisor opens `<base>/sse/subscribe?token=<credential>`
//! 3. On open, the unread counter is refreshed from the backend
//! 4. Each frame is parsed and dispatched:
//!    - `NOTIFICATION`: unread +1, one toast, consumer callback
//!    - `HEARTBEAT`: ignored
//!    - `SHIFT_UPDATE`, `BOOKING_UPDATE`: consumer callbacks
//!    - `CLINIC_COUNTER_UPDATE`: pending clinic counter set
//! 5. Transport errors close the connection and schedule a retry
//!
//! # Example
//!
//! ```rust,ignore
//! use sse::{Callbacks, CredentialSource, Notifier, Options};
//!
//! let credentials = CredentialSource::new();
//! let notifier = Notifier::builder(Options::new("https://api.example.com/api"))
//!     .session(credentials.reader())
//!     .callbacks(Callbacks::new().on_booking_update(|update| {
//!         println!("booking {} is now {}", update.booking_code, update.status);
//!     }))
//!     .spawn()?;
//!
//! credentials.sign_in(token);
//! ```
//!
//! # Modules
//!
//! - `connection`: transports, the `Connector` seam and the eventsource-backed connector
//! - `counter`: observable counters and the `CountSource` refresh seam
//! - `manager`: the connection state machine
//! - `message`: frame decoding
//! - `notifier`: the supervisor task and its handle
//! - `presenter`: notification to toast mapping
//! - `reconnect`: retry policy
//! - `router`: event dispatch and consumer callbacks
//! - `session`: credential publication

pub mod connection;
pub mod counter;
pub mod error;
pub mod manager;
pub mod message;
pub mod notifier;
pub mod presenter;
pub mod reconnect;
pub mod router;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use connection::{Connector, EventSourceConnector, Transport, TransportEvent};
pub use counter::{CountSource, CounterSink, CounterState, Counters};
pub use manager::{ConnectionManager, ConnectionStatus, LifecycleState};
pub use notifier::{Notifier, NotifierBuilder, Options};
pub use presenter::{LogToastSink, Presenter, Severity, ToastSink};
pub use reconnect::{Backoff, ReconnectOptions};
pub use router::{Callbacks, Dispatch, Router};
pub use session::{CredentialSource, Session, SessionReader};
