//! Integration tests for the desk crate
//!
//! These tests verify the sync and SLA pipelines against real stores:
//! reconciliation, import retry, cursor drop semantics, and the SLA row
//! lifecycle from tracking through resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use desk::models::{
    CachedMessage, EmailAddress, EmailPreferences, LabelCount, LabelRecord, MessageId,
    PreferencesUpdate, SlaEmail, SlaLabel, SlaStatus, StatsSnapshot, SyncStatus,
};
use desk::sla::compute_progress;
use desk::storage::{DeskStore, InMemoryDeskStore, SqliteDeskStore};
use tempfile::TempDir;

/// Helper to create cached message summaries
fn make_message(id: &str, age_hours: i64) -> CachedMessage {
    let received_at = Utc::now() - Duration::hours(age_hours);
    CachedMessage::builder(MessageId::new(id), format!("thread-{}", id))
        .from(EmailAddress::with_name("Test User", "test@example.com"))
        .subject(format!("Subject for {}", id))
        .snippet(format!("Snippet for {}", id))
        .received_at(received_at)
        .label_ids(vec!["INBOX".to_string(), "UNREAD".to_string()])
        .build()
}

/// Helper to create SLA rows
fn make_sla_email(user: &str, id: &str, label: SlaLabel, received_at: DateTime<Utc>) -> SlaEmail {
    SlaEmail::new(
        user,
        MessageId::new(id),
        "customer@example.com",
        "Help needed",
        "My invoice looks wrong...",
        label,
        received_at,
    )
}

fn create_sqlite_store() -> (SqliteDeskStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("desk.test.sqlite");
    let store = SqliteDeskStore::new(&db_path).unwrap();
    (store, temp_dir)
}

#[test]
fn test_sync_status_persists_across_reopens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("desk.test.sqlite");
    let user = "user@gmail.com";

    // Open store, seed a cursor, record a failure, close
    {
        let store = SqliteDeskStore::new(&db_path).unwrap();
        store.upsert_sync_status(user, "history_100", None).unwrap();
        store.record_sync_error(user, "connection reset").unwrap();
    }

    // Reopen and verify the cursor and error survived
    {
        let store = SqliteDeskStore::new(&db_path).unwrap();
        let status = store.get_sync_status(user).unwrap().unwrap();
        assert_eq!(status.history_id.as_deref(), Some("history_100"));
        assert_eq!(status.sync_errors, 1);
        assert_eq!(status.last_error.as_deref(), Some("connection reset"));
        assert!(status.needs_historical_import());

        // A successful delta advances the cursor and clears the counter
        store.update_history_id(user, "history_200").unwrap();
        let status = store.get_sync_status(user).unwrap().unwrap();
        assert_eq!(status.history_id.as_deref(), Some("history_200"));
        assert_eq!(status.sync_errors, 0);
    }
}

#[test]
fn test_label_reconciliation_is_idempotent() {
    let (store, _temp_dir) = create_sqlite_store();
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::hours(2);

    let records = vec![
        LabelRecord::new("m1", "INBOX", "INBOX", received),
        LabelRecord::new("m1", "Label_7", "1: billing", received),
    ];

    // Applying the same modification twice leaves one record per pair
    for _ in 0..2 {
        store
            .delete_label_records_for_message(user, &MessageId::new("m1"))
            .unwrap();
        store.save_label_records(user, &records).unwrap();
    }

    let start = Utc::now() - Duration::days(1);
    let end = Utc::now();
    let stored = store.label_records_in_range(user, start, end).unwrap();
    assert_eq!(stored.len(), 2);

    // A label change replaces the whole set, leaving no stale records
    let relabeled = vec![LabelRecord::new("m1", "Label_8", "2: bug report", received)];
    store
        .delete_label_records_for_message(user, &MessageId::new("m1"))
        .unwrap();
    store.save_label_records(user, &relabeled).unwrap();

    let stored = store.label_records_in_range(user, start, end).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].label_id, "Label_8");
}

#[test]
fn test_bulk_import_ignores_duplicates_across_runs() {
    let (store, _temp_dir) = create_sqlite_store();
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::days(10);

    let records: Vec<LabelRecord> = (0..40)
        .map(|i| LabelRecord::new(format!("m{}", i), "INBOX", "INBOX", received))
        .collect();

    // First import writes everything, a repeat import writes nothing
    assert_eq!(store.bulk_save_label_records(user, &records).unwrap(), 40);
    assert_eq!(store.bulk_save_label_records(user, &records).unwrap(), 0);

    let counts = store
        .count_label_messages(user, &["INBOX".to_string()], None)
        .unwrap();
    assert_eq!(counts.get("INBOX"), Some(&40));
}

#[test]
fn test_import_failure_leaves_flag_unset() {
    let (store, _temp_dir) = create_sqlite_store();
    let user = "user@gmail.com";
    store.upsert_sync_status(user, "history_100", None).unwrap();

    // A failed run records the error but never the completion flag
    store.mark_import_started(user).unwrap();
    store
        .record_import_error(user, "2 import batch(es) failed out of 3")
        .unwrap();

    let status = store.get_sync_status(user).unwrap().unwrap();
    assert!(status.needs_historical_import());
    assert!(status.historical_import_started_at.is_some());
    assert!(status.historical_import_completed_at.is_none());
    assert!(status
        .historical_import_error
        .as_deref()
        .unwrap()
        .contains("batch"));

    // The retry starts from scratch and completes
    store.mark_import_started(user).unwrap();
    store.mark_import_completed(user).unwrap();

    let status = store.get_sync_status(user).unwrap().unwrap();
    assert!(!status.needs_historical_import());
    assert!(status.historical_import_completed_at.is_some());
    assert!(status.historical_import_error.is_none());
}

#[test]
fn test_sla_lifecycle_end_to_end() {
    let (store, _temp_dir) = create_sqlite_store();
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::minutes(330); // 5.5h ago

    // Track a billing email 5.5h into its 6h window
    let email = make_sla_email(user, "sla-1", SlaLabel::Billing, received);
    assert!(store.add_sla_email(&email).unwrap());

    // A second sighting (same message, even under another label) is a no-op
    let duplicate = make_sla_email(user, "sla-1", SlaLabel::BugReport, received);
    assert!(!store.add_sla_email(&duplicate).unwrap());

    let rows = store.get_sla_emails(user).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label, SlaLabel::Billing);

    // 5.5h elapsed of 6h/5h puts the row in the warning band
    let progress = compute_progress(&rows[0], Utc::now());
    assert_eq!(progress.status, SlaStatus::Warning);
    assert_eq!(progress.time_remaining_text, "30m left");

    // Resolving locks the status regardless of how late we look
    assert!(store.resolve_sla_email(user, &MessageId::new("sla-1")).unwrap());
    let rows = store.get_sla_emails(user).unwrap();
    assert!(rows[0].resolved);
    assert!(rows[0].resolved_at.is_some());

    let much_later = Utc::now() + Duration::days(30);
    let progress = compute_progress(&rows[0], much_later);
    assert_eq!(progress.status, SlaStatus::Resolved);
    assert_eq!(progress.time_remaining_text, "Resolved");

    // Untracking is idempotent-ish: second delete reports no such row
    assert!(store.delete_sla_email(user, &MessageId::new("sla-1")).unwrap());
    assert!(!store.delete_sla_email(user, &MessageId::new("sla-1")).unwrap());
    assert!(store.get_sla_emails(user).unwrap().is_empty());
}

#[test]
fn test_sla_rows_persist_across_reopens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("desk.test.sqlite");
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::hours(1);

    {
        let store = SqliteDeskStore::new(&db_path).unwrap();
        let email = make_sla_email(user, "sla-1", SlaLabel::FeatureRequest, received);
        store.add_sla_email(&email).unwrap();
        store.resolve_sla_email(user, &MessageId::new("sla-1")).unwrap();
    }

    {
        let store = SqliteDeskStore::new(&db_path).unwrap();
        let rows = store.get_sla_emails(user).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, SlaLabel::FeatureRequest);
        assert!(rows[0].resolved);

        // A fresh sync run still collides on the unique identity
        let again = make_sla_email(user, "sla-1", SlaLabel::FeatureRequest, received);
        assert!(!store.add_sla_email(&again).unwrap());
    }
}

#[test]
fn test_cache_and_labels_cleaned_up_together() {
    let (store, _temp_dir) = create_sqlite_store();
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::hours(3);

    store.cache_messages(user, &[make_message("m1", 3)]).unwrap();
    store
        .save_label_records(user, &[LabelRecord::new("m1", "INBOX", "INBOX", received)])
        .unwrap();

    // The deletion path mirrors a history "deleted" event
    store.remove_cached_message(user, &MessageId::new("m1")).unwrap();
    store
        .delete_label_records_for_message(user, &MessageId::new("m1"))
        .unwrap();

    assert!(store.get_cached_message(user, &MessageId::new("m1")).unwrap().is_none());
    let start = Utc::now() - Duration::days(1);
    assert!(store
        .label_records_in_range(user, start, Utc::now())
        .unwrap()
        .is_empty());
}

// === Cursor drop semantics ===

/// Store wrapper that fails label-record writes on demand, simulating a
/// transient storage outage inside one delta.
struct FlakyLabelStore {
    inner: InMemoryDeskStore,
    fail_label_saves: AtomicBool,
}

impl FlakyLabelStore {
    fn new() -> Self {
        Self {
            inner: InMemoryDeskStore::new(),
            fail_label_saves: AtomicBool::new(false),
        }
    }

    fn fail_next_saves(&self, fail: bool) {
        self.fail_label_saves.store(fail, Ordering::SeqCst);
    }
}

impl DeskStore for FlakyLabelStore {
    fn get_sync_status(&self, user_email: &str) -> Result<Option<SyncStatus>> {
        self.inner.get_sync_status(user_email)
    }

    fn upsert_sync_status(
        &self,
        user_email: &str,
        history_id: &str,
        watch_expiration: Option<DateTime<Utc>>,
    ) -> Result<SyncStatus> {
        self.inner.upsert_sync_status(user_email, history_id, watch_expiration)
    }

    fn update_history_id(&self, user_email: &str, history_id: &str) -> Result<()> {
        self.inner.update_history_id(user_email, history_id)
    }

    fn record_sync_error(&self, user_email: &str, error: &str) -> Result<()> {
        self.inner.record_sync_error(user_email, error)
    }

    fn update_watch_expiration(&self, user_email: &str, expiration: DateTime<Utc>) -> Result<()> {
        self.inner.update_watch_expiration(user_email, expiration)
    }

    fn mark_import_started(&self, user_email: &str) -> Result<()> {
        self.inner.mark_import_started(user_email)
    }

    fn mark_import_completed(&self, user_email: &str) -> Result<()> {
        self.inner.mark_import_completed(user_email)
    }

    fn record_import_error(&self, user_email: &str, error: &str) -> Result<()> {
        self.inner.record_import_error(user_email, error)
    }

    fn cache_messages(&self, user_email: &str, messages: &[CachedMessage]) -> Result<()> {
        self.inner.cache_messages(user_email, messages)
    }

    fn get_cached_messages(&self, user_email: &str, limit: usize) -> Result<Vec<CachedMessage>> {
        self.inner.get_cached_messages(user_email, limit)
    }

    fn get_cached_message(
        &self,
        user_email: &str,
        id: &MessageId,
    ) -> Result<Option<CachedMessage>> {
        self.inner.get_cached_message(user_email, id)
    }

    fn update_cached_message(&self, user_email: &str, message: &CachedMessage) -> Result<bool> {
        self.inner.update_cached_message(user_email, message)
    }

    fn update_cached_labels(
        &self,
        user_email: &str,
        id: &MessageId,
        label_ids: &[String],
    ) -> Result<bool> {
        self.inner.update_cached_labels(user_email, id, label_ids)
    }

    fn remove_cached_message(&self, user_email: &str, id: &MessageId) -> Result<()> {
        self.inner.remove_cached_message(user_email, id)
    }

    fn cached_count(&self, user_email: &str) -> Result<usize> {
        self.inner.cached_count(user_email)
    }

    fn clear_cache(&self, user_email: Option<&str>) -> Result<()> {
        self.inner.clear_cache(user_email)
    }

    fn set_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.inner.set_metadata(key, value)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.inner.get_metadata(key)
    }

    fn save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<()> {
        if self.fail_label_saves.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        self.inner.save_label_records(user_email, records)
    }

    fn bulk_save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<usize> {
        if self.fail_label_saves.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        self.inner.bulk_save_label_records(user_email, records)
    }

    fn delete_label_records_for_message(
        &self,
        user_email: &str,
        message_id: &MessageId,
    ) -> Result<()> {
        self.inner.delete_label_records_for_message(user_email, message_id)
    }

    fn delete_label_records_for_user(&self, user_email: &str) -> Result<()> {
        self.inner.delete_label_records_for_user(user_email)
    }

    fn delete_old_label_records(&self, keep_days: i64) -> Result<usize> {
        self.inner.delete_old_label_records(keep_days)
    }

    fn top_custom_labels(&self, user_email: &str, limit: usize) -> Result<Vec<LabelCount>> {
        self.inner.top_custom_labels(user_email, limit)
    }

    fn custom_labels_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LabelCount>> {
        self.inner.custom_labels_in_range(user_email, start, end, limit)
    }

    fn count_label_messages(
        &self,
        user_email: &str,
        label_ids: &[String],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<HashMap<String, i64>> {
        self.inner.count_label_messages(user_email, label_ids, range)
    }

    fn label_records_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LabelRecord>> {
        self.inner.label_records_in_range(user_email, start, end)
    }

    fn add_sla_email(&self, email: &SlaEmail) -> Result<bool> {
        self.inner.add_sla_email(email)
    }

    fn get_sla_emails(&self, user_email: &str) -> Result<Vec<SlaEmail>> {
        self.inner.get_sla_emails(user_email)
    }

    fn resolve_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        self.inner.resolve_sla_email(user_email, message_id)
    }

    fn delete_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        self.inner.delete_sla_email(user_email, message_id)
    }

    fn add_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        self.inner.add_starred(user_email, message_id)
    }

    fn remove_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        self.inner.remove_starred(user_email, message_id)
    }

    fn is_starred(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        self.inner.is_starred(user_email, message_id)
    }

    fn get_starred_ids(&self, user_email: &str) -> Result<Vec<MessageId>> {
        self.inner.get_starred_ids(user_email)
    }

    fn insert_stats_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        self.inner.insert_stats_snapshot(snapshot)
    }

    fn latest_stats_snapshot(&self, user_email: &str) -> Result<Option<StatsSnapshot>> {
        self.inner.latest_stats_snapshot(user_email)
    }

    fn stats_history(&self, user_email: &str, limit: usize) -> Result<Vec<StatsSnapshot>> {
        self.inner.stats_history(user_email, limit)
    }

    fn delete_old_stats(&self, user_email: &str, keep_days: i64) -> Result<usize> {
        self.inner.delete_old_stats(user_email, keep_days)
    }

    fn get_preferences(&self, user_email: &str) -> Result<EmailPreferences> {
        self.inner.get_preferences(user_email)
    }

    fn update_preferences(
        &self,
        user_email: &str,
        update: &PreferencesUpdate,
    ) -> Result<EmailPreferences> {
        self.inner.update_preferences(user_email, update)
    }
}

/// The delta application order is: advance the cursor, then apply
/// per-message writes. A write failing after the advance means that
/// message's change is dropped, not replayed; this pins that trade-off.
#[test]
fn test_cursor_advances_even_when_apply_fails() {
    let store = FlakyLabelStore::new();
    let user = "user@gmail.com";
    let received = Utc::now() - Duration::hours(1);
    store.upsert_sync_status(user, "history_100", None).unwrap();

    // Tick 1, replaying the engine's order: cursor first, then the apply
    // step, which hits the injected outage.
    store.update_history_id(user, "history_200").unwrap();
    let records = vec![LabelRecord::new("m1", "INBOX", "INBOX", received)];
    store.fail_next_saves(true);
    let apply = store.save_label_records(user, &records);
    assert!(apply.is_err());
    store.record_sync_error(user, "disk I/O error").unwrap();

    // The cursor kept the new value despite the failed apply
    let status = store.get_sync_status(user).unwrap().unwrap();
    assert_eq!(status.history_id.as_deref(), Some("history_200"));
    assert_eq!(status.sync_errors, 1);

    // Tick 2 starts from history_200: the provider will not resend the
    // m1 change, so its record never appears even though storage recovered.
    store.fail_next_saves(false);
    store.update_history_id(user, "history_300").unwrap();

    let start = Utc::now() - Duration::days(1);
    let stored = store.label_records_in_range(user, start, Utc::now()).unwrap();
    assert!(stored.is_empty());
}
