//! Bounded reconnection after transport errors.
//!
//! The policy only counts attempts and computes deadlines; the supervisor owns
//! the actual timer and calls back into the connection manager when it fires.

use log::*;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// How the delay grows between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Every attempt waits the base delay.
    #[default]
    Fixed,
    /// The base delay doubles with each attempt, capped at `max_delay`.
    Exponential { max_delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectOptions {
    pub delay: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: Backoff::Fixed,
        }
    }
}

/// Outcome of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Scheduled { attempt: u32, at: Instant },
    Exhausted { attempts: u32 },
    SessionInvalid,
}

#[derive(Debug)]
pub struct ReconnectPolicy {
    options: ReconnectOptions,
    attempts: u32,
    pending: Option<Instant>,
}

impl ReconnectPolicy {
    pub fn new(options: ReconnectOptions) -> Self {
        Self {
            options,
            attempts: 0,
            pending: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Deadline of the outstanding attempt, if one is scheduled.
    pub fn pending(&self) -> Option<Instant> {
        self.pending
    }

    /// Called from the transport error path only.
    pub fn on_transport_error(&mut self, session_valid: bool, now: Instant) -> Decision {
        if !session_valid {
            debug!("Session no longer valid, not reconnecting");
            self.pending = None;
            return Decision::SessionInvalid;
        }

        if self.attempts >= self.options.max_attempts {
            info!(
                "Max reconnection attempts ({}) reached, staying disconnected",
                self.options.max_attempts
            );
            self.pending = None;
            return Decision::Exhausted {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        let delay = self.delay_for(self.attempts);
        let at = now + delay;
        self.pending = Some(at);

        info!(
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            self.attempts,
            self.options.max_attempts
        );

        Decision::Scheduled {
            attempt: self.attempts,
            at,
        }
    }

    /// Clears the scheduled attempt if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if at <= now => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            debug!("Cancelled pending reconnect");
        }
    }

    /// Called after a successful open and on manual intervention.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.options.backoff {
            Backoff::Fixed => self.options.delay,
            Backoff::Exponential { max_delay } => {
                let exponent = attempt.saturating_sub(1).min(31);
                self.options
                    .delay
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(max_delay)
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectOptions::default())
    }
}
