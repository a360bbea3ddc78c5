//! Sync status tracking for incremental Gmail sync

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tracks sync progress for one user
///
/// Persisted separately from cached messages so the incremental sync engine
/// can resume from the last history cursor across sessions. Only one
/// SyncStatus per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// User the status belongs to (Gmail address)
    pub user_email: String,
    /// Gmail historyId cursor; None until the first successful poll
    pub history_id: Option<String>,
    /// When we last successfully synced
    pub last_sync_at: DateTime<Utc>,
    /// Consecutive-with-resets count of sync failures
    pub sync_errors: i64,
    /// Message of the most recent sync failure
    pub last_error: Option<String>,
    /// When the push-notification watch channel expires
    pub watch_expiration: Option<DateTime<Utc>>,
    /// Whether the one-time historical import has completed
    pub historical_import_completed: bool,
    /// When the historical import last started
    pub historical_import_started_at: Option<DateTime<Utc>>,
    /// When the historical import completed
    pub historical_import_completed_at: Option<DateTime<Utc>>,
    /// Error message from the last failed import attempt
    pub historical_import_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncStatus {
    /// Create a fresh status for a user, cursored at the given history id
    pub fn new(user_email: impl Into<String>, history_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_email: user_email.into(),
            history_id: Some(history_id.into()),
            last_sync_at: now,
            sync_errors: 0,
            last_error: None,
            watch_expiration: None,
            historical_import_completed: false,
            historical_import_started_at: None,
            historical_import_completed_at: None,
            historical_import_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the historical import still needs to run
    pub fn needs_historical_import(&self) -> bool {
        !self.historical_import_completed
    }

    /// Whether the watch channel is missing or expires within 24 hours
    pub fn watch_needs_renewal(&self, now: DateTime<Utc>) -> bool {
        match self.watch_expiration {
            Some(expiration) => expiration - now < Duration::hours(24),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sync_status() {
        let status = SyncStatus::new("user@gmail.com", "12345");
        assert_eq!(status.user_email, "user@gmail.com");
        assert_eq!(status.history_id.as_deref(), Some("12345"));
        assert_eq!(status.sync_errors, 0);
        assert!(status.needs_historical_import());
    }

    #[test]
    fn test_watch_needs_renewal_when_missing() {
        let status = SyncStatus::new("user@gmail.com", "12345");
        assert!(status.watch_needs_renewal(Utc::now()));
    }

    #[test]
    fn test_watch_needs_renewal_when_expiring_soon() {
        let now = Utc::now();
        let mut status = SyncStatus::new("user@gmail.com", "12345");
        status.watch_expiration = Some(now + Duration::hours(12));
        assert!(status.watch_needs_renewal(now));

        status.watch_expiration = Some(now + Duration::hours(48));
        assert!(!status.watch_needs_renewal(now));
    }

    #[test]
    fn test_serialization() {
        let status = SyncStatus::new("user@gmail.com", "12345");
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: SyncStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status.user_email, deserialized.user_email);
        assert_eq!(status.history_id, deserialized.history_id);
    }
}
