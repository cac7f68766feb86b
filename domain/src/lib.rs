//! Domain layer for clinic notifications: the REST gateway for the
//! notification endpoints and the local inbox that merges pushed and fetched
//! notifications.

pub mod error;
pub mod gateway;
pub mod inbox;

pub use gateway::notifications::{NotificationPage, NotificationsClient};
pub use inbox::NotificationInbox;
