//! Storage trait definitions

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{
    CachedMessage, EmailPreferences, LabelCount, LabelRecord, MessageId, PreferencesUpdate,
    SlaEmail, StatsSnapshot, SyncStatus,
};

/// Maximum cached message summaries kept per user
pub const MAX_CACHED_MESSAGES: usize = 1000;

/// Trait for dashboard storage operations
///
/// This trait abstracts over different storage backends (in-memory, database,
/// etc.). All rows are scoped to a user's Gmail address so a single store
/// can hold multiple accounts.
pub trait DeskStore: Send + Sync {
    // === Sync Status ===

    /// Get sync status for a user
    fn get_sync_status(&self, user_email: &str) -> Result<Option<SyncStatus>>;

    /// Insert or update sync status, resetting the error counter
    ///
    /// The import flags are left untouched on conflict, and the watch
    /// expiration is only overwritten when a new value is given.
    fn upsert_sync_status(
        &self,
        user_email: &str,
        history_id: &str,
        watch_expiration: Option<DateTime<Utc>>,
    ) -> Result<SyncStatus>;

    /// Advance the history cursor after a successful sync
    ///
    /// Also refreshes `last_sync_at` and clears the error counter.
    fn update_history_id(&self, user_email: &str, history_id: &str) -> Result<()>;

    /// Record a sync failure without touching the cursor
    fn record_sync_error(&self, user_email: &str, error: &str) -> Result<()>;

    /// Store a new watch channel expiration
    fn update_watch_expiration(&self, user_email: &str, expiration: DateTime<Utc>) -> Result<()>;

    /// Mark the historical import as started, clearing any previous error
    fn mark_import_started(&self, user_email: &str) -> Result<()>;

    /// Mark the historical import as completed
    fn mark_import_completed(&self, user_email: &str) -> Result<()>;

    /// Record a historical import failure, leaving the completion flag unset
    fn record_import_error(&self, user_email: &str, error: &str) -> Result<()>;

    // === Cached Messages ===

    /// Insert or overwrite message summaries, then evict beyond the cap
    ///
    /// Eviction removes the entries with the oldest `cached_at` first.
    fn cache_messages(&self, user_email: &str, messages: &[CachedMessage]) -> Result<()>;

    /// List cached messages, most recently cached first
    fn get_cached_messages(&self, user_email: &str, limit: usize) -> Result<Vec<CachedMessage>>;

    /// Get a single cached message
    fn get_cached_message(
        &self,
        user_email: &str,
        id: &MessageId,
    ) -> Result<Option<CachedMessage>>;

    /// Patch an existing cache entry in place
    ///
    /// Returns false (and writes nothing) when the message is not cached.
    /// Refreshes `cached_at` so the entry survives eviction longer.
    fn update_cached_message(&self, user_email: &str, message: &CachedMessage) -> Result<bool>;

    /// Replace the label set on a cache entry, recomputing the derived
    /// read/starred flags
    ///
    /// Returns false when the message is not cached.
    fn update_cached_labels(
        &self,
        user_email: &str,
        id: &MessageId,
        label_ids: &[String],
    ) -> Result<bool>;

    /// Remove a message from the cache
    fn remove_cached_message(&self, user_email: &str, id: &MessageId) -> Result<()>;

    /// Count cached messages for a user
    fn cached_count(&self, user_email: &str) -> Result<usize>;

    /// Clear the cache for one user, or for everyone when None
    fn clear_cache(&self, user_email: Option<&str>) -> Result<()>;

    // === Metadata ===

    /// Store a small JSON value under a key
    fn set_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Fetch a stored JSON value
    fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>>;

    // === Label Records ===

    /// Upsert label records, overwriting the denormalized name on conflict
    fn save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<()>;

    /// Insert label records ignoring duplicates, returning how many were new
    ///
    /// Callers chunk large imports; each call commits independently.
    fn bulk_save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<usize>;

    /// Delete all label records for one message
    fn delete_label_records_for_message(
        &self,
        user_email: &str,
        message_id: &MessageId,
    ) -> Result<()>;

    /// Delete every label record for a user
    fn delete_label_records_for_user(&self, user_email: &str) -> Result<()>;

    /// Delete label records older than the retention window, all users
    ///
    /// Returns the number of rows removed.
    fn delete_old_label_records(&self, keep_days: i64) -> Result<usize>;

    /// Top user-created labels by distinct message count
    fn top_custom_labels(&self, user_email: &str, limit: usize) -> Result<Vec<LabelCount>>;

    /// Top user-created labels within a received-date range
    fn custom_labels_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LabelCount>>;

    /// Distinct message counts for specific labels, optionally bounded to a
    /// received-date range
    fn count_label_messages(
        &self,
        user_email: &str,
        label_ids: &[String],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<HashMap<String, i64>>;

    /// All label records in a received-date range, newest first
    fn label_records_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LabelRecord>>;

    // === SLA Emails ===

    /// Track a new SLA email
    ///
    /// Returns false when the (user, message) pair is already tracked; the
    /// existing row is left untouched.
    fn add_sla_email(&self, email: &SlaEmail) -> Result<bool>;

    /// List tracked emails for a user, newest received first
    fn get_sla_emails(&self, user_email: &str) -> Result<Vec<SlaEmail>>;

    /// Mark a tracked email resolved at the current time
    ///
    /// Returns false when no such row exists.
    fn resolve_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool>;

    /// Stop tracking an email
    ///
    /// Returns false when no such row exists.
    fn delete_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool>;

    // === Starred Emails ===

    /// Record a star; duplicates are not an error
    fn add_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()>;

    /// Remove a star
    fn remove_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()>;

    /// Whether a message is starred
    fn is_starred(&self, user_email: &str, message_id: &MessageId) -> Result<bool>;

    /// All starred message ids for a user
    fn get_starred_ids(&self, user_email: &str) -> Result<Vec<MessageId>>;

    // === Stats Snapshots ===

    /// Append a stats snapshot (insert, never update)
    fn insert_stats_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()>;

    /// The most recent snapshot for a user
    fn latest_stats_snapshot(&self, user_email: &str) -> Result<Option<StatsSnapshot>>;

    /// Recent snapshots, newest first
    fn stats_history(&self, user_email: &str, limit: usize) -> Result<Vec<StatsSnapshot>>;

    /// Delete snapshots older than the retention window
    ///
    /// Returns the number of rows removed.
    fn delete_old_stats(&self, user_email: &str, keep_days: i64) -> Result<usize>;

    // === Preferences ===

    /// Stored preferences for a user, or the defaults when absent
    fn get_preferences(&self, user_email: &str) -> Result<EmailPreferences>;

    /// Apply a partial preferences update, returning the merged result
    ///
    /// Missing rows are created from the defaults first.
    fn update_preferences(
        &self,
        user_email: &str,
        update: &PreferencesUpdate,
    ) -> Result<EmailPreferences>;
}
