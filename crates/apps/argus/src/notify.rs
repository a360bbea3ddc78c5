//! In-process notification center
//!
//! Queues transient user-facing notifications with a fixed auto-dismiss.
//! The daemon pushes from engine callbacks and scheduler ticks; anything a
//! frontend would surface as a toast goes through here and also lands in
//! the log.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

/// How long a notification stays visible
pub const NOTIFICATION_TTL_SECS: i64 = 5;

/// Category of a notification, mirrored in the log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewMail,
    SyncError,
    Sla,
    Webhook,
    Config,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= Duration::seconds(NOTIFICATION_TTL_SECS)
    }
}

/// FIFO queue of live notifications
///
/// Expired entries are pruned on read, not by a timer, so the queue never
/// needs its own scheduling.
pub struct NotificationCenter {
    queue: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) {
        self.push_at(kind, title, message, Utc::now());
    }

    fn push_at(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let notification = Notification {
            kind,
            title: title.into(),
            message: message.into(),
            created_at: now,
        };

        match kind {
            NotificationKind::SyncError => {
                warn!("[{}] {}", notification.title, notification.message)
            }
            _ => info!("[{}] {}", notification.title, notification.message),
        }

        let mut queue = self.queue.lock().unwrap();
        queue.push_back(notification);
    }

    /// Live notifications at `now`, oldest first. Prunes expired entries.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut queue = self.queue.lock().unwrap();
        while queue.front().is_some_and(|n| n.expired(now)) {
            queue.pop_front();
        }
        // Later entries can outlive earlier ones only by insertion order,
        // so front-pruning is enough.
        queue.iter().cloned().collect()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read() {
        let center = NotificationCenter::new();
        let now = Utc::now();
        center.push_at(NotificationKind::NewMail, "New mail", "3 unread", now);

        let active = center.active(now);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "New mail");
        assert_eq!(active[0].kind, NotificationKind::NewMail);
    }

    #[test]
    fn test_expires_after_ttl() {
        let center = NotificationCenter::new();
        let now = Utc::now();
        center.push_at(NotificationKind::Webhook, "Workflow", "Triggered", now);

        let later = now + Duration::seconds(NOTIFICATION_TTL_SECS);
        assert!(center.active(later).is_empty());

        let just_before = now + Duration::seconds(NOTIFICATION_TTL_SECS - 1);
        // Already pruned by the read above
        assert!(center.active(just_before).is_empty());
    }

    #[test]
    fn test_prunes_only_expired() {
        let center = NotificationCenter::new();
        let now = Utc::now();
        center.push_at(NotificationKind::SyncError, "Sync", "failed", now);
        center.push_at(
            NotificationKind::NewMail,
            "New mail",
            "1 unread",
            now + Duration::seconds(3),
        );

        let active = center.active(now + Duration::seconds(6));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "New mail");
    }
}
