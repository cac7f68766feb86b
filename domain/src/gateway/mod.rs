//! Clients for the booking platform's REST API.

pub mod notifications;
