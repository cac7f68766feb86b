//! Local notification list fed by both the push stream and the REST list
//! endpoint.
//!
//! The same notification can arrive more than once (redelivery after a
//! reconnect, or a pushed item that later shows up in a fetched page), so the
//! inbox keys everything by `notification_id`. Read flips made here are
//! advisory: they are kept until the backend confirms them through a later
//! fetch, and a redelivered copy never turns a locally read item unread again.

use chrono::{DateTime, Utc};
use events::Notification;
use log::*;

#[derive(Debug, Default, Clone)]
pub struct NotificationInbox {
    items: Vec<Notification>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a notification or updates the stored copy with the same id.
    ///
    /// Returns `true` if the notification was not seen before.
    pub fn upsert(&mut self, notification: Notification) -> bool {
        let inserted = self.merge(notification);
        self.sort();
        inserted
    }

    /// Merges a fetched page. Returns how many notifications were new.
    pub fn merge_page(&mut self, notifications: impl IntoIterator<Item = Notification>) -> usize {
        let mut inserted = 0;
        for notification in notifications {
            if self.merge(notification) {
                inserted += 1;
            }
        }
        self.sort();
        inserted
    }

    /// Flips one notification to read. Returns `true` if it was unread.
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        match self
            .items
            .iter_mut()
            .find(|n| n.notification_id == notification_id)
        {
            Some(notification) if !notification.read => {
                notification.read = true;
                true
            }
            _ => false,
        }
    }

    /// Flips every notification to read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.items.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn get(&self, notification_id: &str) -> Option<&Notification> {
        self.items
            .iter()
            .find(|n| n.notification_id == notification_id)
    }

    /// Notifications, newest first.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn merge(&mut self, mut notification: Notification) -> bool {
        match self
            .items
            .iter_mut()
            .find(|n| n.notification_id == notification.notification_id)
        {
            Some(existing) => {
                trace!("Duplicate notification {}", notification.notification_id);
                notification.read |= existing.read;
                *existing = notification;
                false
            }
            None => {
                self.items.push(notification);
                true
            }
        }
    }

    // Stable, so items with equal or missing timestamps keep arrival order.
    // Unparseable timestamps sort after everything else.
    fn sort(&mut self) {
        self.items
            .sort_by_key(|n| std::cmp::Reverse(SortKey(n.created_at_utc())));
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct SortKey(Option<DateTime<Utc>>);
