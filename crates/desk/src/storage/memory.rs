//! In-memory storage implementation
//!
//! Used in tests and anywhere a throwaway store is handy. Mirrors the
//! SQLite implementation's semantics, including eviction and conflict
//! behavior.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use super::traits::{DeskStore, MAX_CACHED_MESSAGES};
use crate::models::{
    CachedMessage, EmailPreferences, LabelCount, LabelRecord, MessageId, PreferencesUpdate,
    SlaEmail, StatsSnapshot, SyncStatus,
};

/// In-memory implementation of DeskStore
///
/// Uses HashMaps protected by RwLocks for thread-safe access.
pub struct InMemoryDeskStore {
    /// Sync status per user
    sync_statuses: RwLock<HashMap<String, SyncStatus>>,
    /// user -> message id -> cached summary
    cached: RwLock<HashMap<String, HashMap<String, CachedMessage>>>,
    metadata: RwLock<HashMap<String, serde_json::Value>>,
    /// user -> (message id, label id) -> record
    label_records: RwLock<HashMap<String, HashMap<(String, String), LabelRecord>>>,
    /// user -> message id -> tracked row
    sla_emails: RwLock<HashMap<String, HashMap<String, SlaEmail>>>,
    starred: RwLock<HashMap<String, HashSet<String>>>,
    /// Snapshots in insertion order per user
    stats: RwLock<HashMap<String, Vec<StatsSnapshot>>>,
    preferences: RwLock<HashMap<String, EmailPreferences>>,
}

impl InMemoryDeskStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            sync_statuses: RwLock::new(HashMap::new()),
            cached: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            label_records: RwLock::new(HashMap::new()),
            sla_emails: RwLock::new(HashMap::new()),
            starred: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            preferences: RwLock::new(HashMap::new()),
        }
    }

    /// Group label records into per-label distinct message counts
    fn label_counts(
        &self,
        user_email: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        custom_only: bool,
    ) -> Vec<LabelCount> {
        let records = self.label_records.read().unwrap();
        let Some(user_records) = records.get(user_email) else {
            return Vec::new();
        };

        let mut grouped: HashMap<String, (String, HashSet<String>)> = HashMap::new();
        for record in user_records.values() {
            if custom_only && !record.label_id.starts_with("Label_") {
                continue;
            }
            if let Some((start, end)) = range
                && (record.received_date < start || record.received_date > end)
            {
                continue;
            }

            let entry = grouped
                .entry(record.label_id.clone())
                .or_insert_with(|| (record.label_name.clone(), HashSet::new()));
            if record.label_name > entry.0 {
                entry.0 = record.label_name.clone();
            }
            entry.1.insert(record.message_id.as_str().to_string());
        }

        let mut counts: Vec<LabelCount> = grouped
            .into_iter()
            .map(|(label_id, (label_name, ids))| LabelCount {
                label_id,
                label_name,
                email_count: ids.len() as i64,
            })
            .collect();
        counts.sort_by(|a, b| b.email_count.cmp(&a.email_count).then(a.label_id.cmp(&b.label_id)));
        counts
    }
}

impl Default for InMemoryDeskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeskStore for InMemoryDeskStore {
    // === Sync Status ===

    fn get_sync_status(&self, user_email: &str) -> Result<Option<SyncStatus>> {
        let statuses = self.sync_statuses.read().unwrap();
        Ok(statuses.get(user_email).cloned())
    }

    fn upsert_sync_status(
        &self,
        user_email: &str,
        history_id: &str,
        watch_expiration: Option<DateTime<Utc>>,
    ) -> Result<SyncStatus> {
        let mut statuses = self.sync_statuses.write().unwrap();
        let now = Utc::now();

        let status = statuses
            .entry(user_email.to_string())
            .or_insert_with(|| SyncStatus::new(user_email, history_id));
        status.history_id = Some(history_id.to_string());
        status.last_sync_at = now;
        status.sync_errors = 0;
        status.last_error = None;
        if watch_expiration.is_some() {
            status.watch_expiration = watch_expiration;
        }
        status.updated_at = now;

        Ok(status.clone())
    }

    fn update_history_id(&self, user_email: &str, history_id: &str) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.history_id = Some(history_id.to_string());
            status.last_sync_at = Utc::now();
            status.sync_errors = 0;
            status.last_error = None;
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    fn record_sync_error(&self, user_email: &str, error: &str) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.sync_errors += 1;
            status.last_error = Some(error.to_string());
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    fn update_watch_expiration(&self, user_email: &str, expiration: DateTime<Utc>) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.watch_expiration = Some(expiration);
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    fn mark_import_started(&self, user_email: &str) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.historical_import_started_at = Some(Utc::now());
            status.historical_import_error = None;
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    fn mark_import_completed(&self, user_email: &str) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.historical_import_completed = true;
            status.historical_import_completed_at = Some(Utc::now());
            status.historical_import_error = None;
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    fn record_import_error(&self, user_email: &str, error: &str) -> Result<()> {
        let mut statuses = self.sync_statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(user_email) {
            status.historical_import_error = Some(error.to_string());
            status.updated_at = Utc::now();
        }
        Ok(())
    }

    // === Cached Messages ===

    fn cache_messages(&self, user_email: &str, messages: &[CachedMessage]) -> Result<()> {
        let mut cached = self.cached.write().unwrap();
        let user_cache = cached.entry(user_email.to_string()).or_default();

        for message in messages {
            user_cache.insert(message.id.as_str().to_string(), message.clone());
        }

        // Evict oldest-cached entries beyond the cap
        if user_cache.len() > MAX_CACHED_MESSAGES {
            let mut order: Vec<(DateTime<Utc>, String)> = user_cache
                .values()
                .map(|m| (m.cached_at, m.id.as_str().to_string()))
                .collect();
            order.sort();
            let excess = user_cache.len() - MAX_CACHED_MESSAGES;
            for (_, id) in order.into_iter().take(excess) {
                user_cache.remove(&id);
            }
        }

        Ok(())
    }

    fn get_cached_messages(&self, user_email: &str, limit: usize) -> Result<Vec<CachedMessage>> {
        let cached = self.cached.read().unwrap();
        let Some(user_cache) = cached.get(user_email) else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<CachedMessage> = user_cache.values().cloned().collect();
        messages.sort_by(|a, b| {
            b.cached_at
                .cmp(&a.cached_at)
                .then(b.id.as_str().cmp(a.id.as_str()))
        });
        messages.truncate(limit);
        Ok(messages)
    }

    fn get_cached_message(
        &self,
        user_email: &str,
        id: &MessageId,
    ) -> Result<Option<CachedMessage>> {
        let cached = self.cached.read().unwrap();
        Ok(cached
            .get(user_email)
            .and_then(|user_cache| user_cache.get(id.as_str()))
            .cloned())
    }

    fn update_cached_message(&self, user_email: &str, message: &CachedMessage) -> Result<bool> {
        let mut cached = self.cached.write().unwrap();
        let Some(existing) = cached
            .get_mut(user_email)
            .and_then(|user_cache| user_cache.get_mut(message.id.as_str()))
        else {
            return Ok(false);
        };

        *existing = message.clone();
        existing.cached_at = Utc::now();
        Ok(true)
    }

    fn update_cached_labels(
        &self,
        user_email: &str,
        id: &MessageId,
        label_ids: &[String],
    ) -> Result<bool> {
        let mut cached = self.cached.write().unwrap();
        let Some(existing) = cached
            .get_mut(user_email)
            .and_then(|user_cache| user_cache.get_mut(id.as_str()))
        else {
            return Ok(false);
        };

        existing.label_ids = label_ids.to_vec();
        existing.is_read = !label_ids.iter().any(|l| l.as_str() == "UNREAD");
        existing.is_starred = label_ids.iter().any(|l| l.as_str() == "STARRED");
        existing.cached_at = Utc::now();
        Ok(true)
    }

    fn remove_cached_message(&self, user_email: &str, id: &MessageId) -> Result<()> {
        let mut cached = self.cached.write().unwrap();
        if let Some(user_cache) = cached.get_mut(user_email) {
            user_cache.remove(id.as_str());
        }
        Ok(())
    }

    fn cached_count(&self, user_email: &str) -> Result<usize> {
        let cached = self.cached.read().unwrap();
        Ok(cached.get(user_email).map(|c| c.len()).unwrap_or(0))
    }

    fn clear_cache(&self, user_email: Option<&str>) -> Result<()> {
        let mut cached = self.cached.write().unwrap();
        match user_email {
            Some(user_email) => {
                cached.remove(user_email);
            }
            None => cached.clear(),
        }
        Ok(())
    }

    // === Metadata ===

    fn set_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut metadata = self.metadata.write().unwrap();
        metadata.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let metadata = self.metadata.read().unwrap();
        Ok(metadata.get(key).cloned())
    }

    // === Label Records ===

    fn save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<()> {
        let mut all = self.label_records.write().unwrap();
        let user_records = all.entry(user_email.to_string()).or_default();

        for record in records {
            let key = (
                record.message_id.as_str().to_string(),
                record.label_id.clone(),
            );
            user_records.insert(key, record.clone());
        }
        Ok(())
    }

    fn bulk_save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<usize> {
        let mut all = self.label_records.write().unwrap();
        let user_records = all.entry(user_email.to_string()).or_default();

        let mut inserted = 0;
        for record in records {
            let key = (
                record.message_id.as_str().to_string(),
                record.label_id.clone(),
            );
            if !user_records.contains_key(&key) {
                user_records.insert(key, record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn delete_label_records_for_message(
        &self,
        user_email: &str,
        message_id: &MessageId,
    ) -> Result<()> {
        let mut all = self.label_records.write().unwrap();
        if let Some(user_records) = all.get_mut(user_email) {
            user_records.retain(|(msg_id, _), _| msg_id != message_id.as_str());
        }
        Ok(())
    }

    fn delete_label_records_for_user(&self, user_email: &str) -> Result<()> {
        let mut all = self.label_records.write().unwrap();
        all.remove(user_email);
        Ok(())
    }

    fn delete_old_label_records(&self, keep_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(keep_days);
        let mut all = self.label_records.write().unwrap();

        let mut deleted = 0;
        for user_records in all.values_mut() {
            let before = user_records.len();
            user_records.retain(|_, record| record.received_date >= cutoff);
            deleted += before - user_records.len();
        }
        Ok(deleted)
    }

    fn top_custom_labels(&self, user_email: &str, limit: usize) -> Result<Vec<LabelCount>> {
        let mut counts = self.label_counts(user_email, None, true);
        counts.truncate(limit);
        Ok(counts)
    }

    fn custom_labels_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LabelCount>> {
        let mut counts = self.label_counts(user_email, Some((start, end)), true);
        counts.truncate(limit);
        Ok(counts)
    }

    fn count_label_messages(
        &self,
        user_email: &str,
        label_ids: &[String],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<HashMap<String, i64>> {
        let counts = self.label_counts(user_email, range, false);
        Ok(counts
            .into_iter()
            .filter(|count| label_ids.contains(&count.label_id))
            .map(|count| (count.label_id, count.email_count))
            .collect())
    }

    fn label_records_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LabelRecord>> {
        let all = self.label_records.read().unwrap();
        let Some(user_records) = all.get(user_email) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<LabelRecord> = user_records
            .values()
            .filter(|r| r.received_date >= start && r.received_date <= end)
            .cloned()
            .collect();
        records.sort_by_key(|r| Reverse(r.received_date));
        Ok(records)
    }

    // === SLA Emails ===

    fn add_sla_email(&self, email: &SlaEmail) -> Result<bool> {
        let mut all = self.sla_emails.write().unwrap();
        let user_emails = all.entry(email.user_email.clone()).or_default();

        let key = email.message_id.as_str().to_string();
        if user_emails.contains_key(&key) {
            return Ok(false);
        }
        user_emails.insert(key, email.clone());
        Ok(true)
    }

    fn get_sla_emails(&self, user_email: &str) -> Result<Vec<SlaEmail>> {
        let all = self.sla_emails.read().unwrap();
        let Some(user_emails) = all.get(user_email) else {
            return Ok(Vec::new());
        };

        let mut emails: Vec<SlaEmail> = user_emails.values().cloned().collect();
        emails.sort_by_key(|e| Reverse(e.received_at));
        Ok(emails)
    }

    fn resolve_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let mut all = self.sla_emails.write().unwrap();
        let Some(email) = all
            .get_mut(user_email)
            .and_then(|user_emails| user_emails.get_mut(message_id.as_str()))
        else {
            return Ok(false);
        };

        email.resolved = true;
        email.resolved_at = Some(Utc::now());
        email.updated_at = Utc::now();
        Ok(true)
    }

    fn delete_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let mut all = self.sla_emails.write().unwrap();
        Ok(all
            .get_mut(user_email)
            .and_then(|user_emails| user_emails.remove(message_id.as_str()))
            .is_some())
    }

    // === Starred Emails ===

    fn add_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        let mut starred = self.starred.write().unwrap();
        starred
            .entry(user_email.to_string())
            .or_default()
            .insert(message_id.as_str().to_string());
        Ok(())
    }

    fn remove_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        let mut starred = self.starred.write().unwrap();
        if let Some(user_starred) = starred.get_mut(user_email) {
            user_starred.remove(message_id.as_str());
        }
        Ok(())
    }

    fn is_starred(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let starred = self.starred.read().unwrap();
        Ok(starred
            .get(user_email)
            .is_some_and(|user_starred| user_starred.contains(message_id.as_str())))
    }

    fn get_starred_ids(&self, user_email: &str) -> Result<Vec<MessageId>> {
        let starred = self.starred.read().unwrap();
        Ok(starred
            .get(user_email)
            .map(|user_starred| {
                user_starred
                    .iter()
                    .map(|id| MessageId::new(id.as_str()))
                    .collect()
            })
            .unwrap_or_default())
    }

    // === Stats Snapshots ===

    fn insert_stats_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        let mut stats = self.stats.write().unwrap();
        stats
            .entry(snapshot.user_email.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn latest_stats_snapshot(&self, user_email: &str) -> Result<Option<StatsSnapshot>> {
        Ok(self.stats_history(user_email, 1)?.into_iter().next())
    }

    fn stats_history(&self, user_email: &str, limit: usize) -> Result<Vec<StatsSnapshot>> {
        let stats = self.stats.read().unwrap();
        let Some(user_stats) = stats.get(user_email) else {
            return Ok(Vec::new());
        };

        // Newest first; insertion order breaks created_at ties
        let mut indexed: Vec<(usize, &StatsSnapshot)> = user_stats.iter().enumerate().collect();
        indexed.sort_by_key(|(i, s)| (Reverse(s.created_at), Reverse(*i)));
        Ok(indexed
            .into_iter()
            .take(limit)
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn delete_old_stats(&self, user_email: &str, keep_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(keep_days);
        let mut stats = self.stats.write().unwrap();
        let Some(user_stats) = stats.get_mut(user_email) else {
            return Ok(0);
        };

        let before = user_stats.len();
        user_stats.retain(|s| s.created_at >= cutoff);
        Ok(before - user_stats.len())
    }

    // === Preferences ===

    fn get_preferences(&self, user_email: &str) -> Result<EmailPreferences> {
        let preferences = self.preferences.read().unwrap();
        Ok(preferences
            .get(user_email)
            .cloned()
            .unwrap_or_else(|| EmailPreferences::defaults(user_email)))
    }

    fn update_preferences(
        &self,
        user_email: &str,
        update: &PreferencesUpdate,
    ) -> Result<EmailPreferences> {
        let mut preferences = self.preferences.write().unwrap();
        let prefs = preferences
            .entry(user_email.to_string())
            .or_insert_with(|| EmailPreferences::defaults(user_email));

        if let Some(width) = update.sidebar_width {
            prefs.sidebar_width = width;
        }
        if let Some(open) = update.sidebar_open {
            prefs.sidebar_open = open;
        }
        if let Some(folder) = &update.selected_folder {
            prefs.selected_folder = folder.clone();
        }
        if let Some(load) = update.load_external_images {
            prefs.load_external_images = load;
        }

        Ok(prefs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_test_message(id: &str, cached_at: DateTime<Utc>) -> CachedMessage {
        CachedMessage::builder(MessageId::new(id), format!("t-{}", id))
            .subject("Test")
            .label_ids(vec!["INBOX".to_string(), "UNREAD".to_string()])
            .is_read(false)
            .cached_at(cached_at)
            .build()
    }

    #[test]
    fn test_sync_error_counter_resets_on_success() {
        let store = InMemoryDeskStore::new();

        store.upsert_sync_status("u@gmail.com", "100", None).unwrap();
        store.record_sync_error("u@gmail.com", "boom").unwrap();
        store.record_sync_error("u@gmail.com", "boom again").unwrap();
        assert_eq!(
            store.get_sync_status("u@gmail.com").unwrap().unwrap().sync_errors,
            2
        );

        store.update_history_id("u@gmail.com", "101").unwrap();
        let status = store.get_sync_status("u@gmail.com").unwrap().unwrap();
        assert_eq!(status.sync_errors, 0);
        assert_eq!(status.history_id.as_deref(), Some("101"));
    }

    #[test]
    fn test_cache_eviction_matches_sqlite_semantics() {
        let store = InMemoryDeskStore::new();
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let messages: Vec<CachedMessage> = (0..MAX_CACHED_MESSAGES + 2)
            .map(|i| make_test_message(&format!("m{:05}", i), base + Duration::seconds(i as i64)))
            .collect();
        store.cache_messages("u@gmail.com", &messages).unwrap();

        assert_eq!(store.cached_count("u@gmail.com").unwrap(), MAX_CACHED_MESSAGES);
        assert!(
            store
                .get_cached_message("u@gmail.com", &MessageId::new("m00001"))
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .get_cached_message("u@gmail.com", &MessageId::new("m00002"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_update_requires_existing_entry() {
        let store = InMemoryDeskStore::new();
        let msg = make_test_message("m1", Utc::now());

        assert!(!store.update_cached_message("u@gmail.com", &msg).unwrap());
        store.cache_messages("u@gmail.com", &[msg.clone()]).unwrap();
        assert!(store.update_cached_message("u@gmail.com", &msg).unwrap());
    }

    #[test]
    fn test_label_records_and_counts() {
        let store = InMemoryDeskStore::new();
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        store
            .save_label_records(
                "u@gmail.com",
                &[
                    LabelRecord::new("m1", "Label_1", "1: billing", received),
                    LabelRecord::new("m2", "Label_1", "1: billing", received),
                    LabelRecord::new("m1", "INBOX", "INBOX", received),
                ],
            )
            .unwrap();

        let top = store.top_custom_labels("u@gmail.com", 7).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].email_count, 2);

        store
            .delete_label_records_for_message("u@gmail.com", &MessageId::new("m1"))
            .unwrap();
        let top = store.top_custom_labels("u@gmail.com", 7).unwrap();
        assert_eq!(top[0].email_count, 1);

        store.delete_label_records_for_user("u@gmail.com").unwrap();
        assert!(store.top_custom_labels("u@gmail.com", 7).unwrap().is_empty());
    }

    #[test]
    fn test_bulk_save_counts_new_rows_only() {
        let store = InMemoryDeskStore::new();
        let received = Utc::now();

        let records = vec![
            LabelRecord::new("m1", "Label_1", "1: billing", received),
            LabelRecord::new("m2", "Label_1", "1: billing", received),
        ];
        assert_eq!(store.bulk_save_label_records("u@gmail.com", &records).unwrap(), 2);
        assert_eq!(store.bulk_save_label_records("u@gmail.com", &records).unwrap(), 0);
    }

    #[test]
    fn test_sla_first_insert_wins() {
        let store = InMemoryDeskStore::new();
        let received = Utc::now();

        let first = SlaEmail::new(
            "u@gmail.com",
            MessageId::new("m1"),
            "a@example.com",
            "First",
            "preview",
            crate::models::SlaLabel::Billing,
            received,
        );
        let mut second = first.clone();
        second.subject = "Second".to_string();

        assert!(store.add_sla_email(&first).unwrap());
        assert!(!store.add_sla_email(&second).unwrap());
        assert_eq!(store.get_sla_emails("u@gmail.com").unwrap()[0].subject, "First");
    }

    #[test]
    fn test_preferences_merge() {
        let store = InMemoryDeskStore::new();

        let update = PreferencesUpdate {
            sidebar_open: Some(false),
            ..Default::default()
        };
        let merged = store.update_preferences("u@gmail.com", &update).unwrap();
        assert!(!merged.sidebar_open);
        assert_eq!(merged.sidebar_width, 280);
    }

    #[test]
    fn test_stats_history_ordering() {
        let store = InMemoryDeskStore::new();
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        for i in 0..3u32 {
            store
                .insert_stats_snapshot(&StatsSnapshot {
                    user_email: "u@gmail.com".to_string(),
                    total_inbox: i,
                    unread_inbox: 0,
                    drafts: 0,
                    sent: 0,
                    spam: 0,
                    custom_labels: Vec::new(),
                    created_at: base + Duration::minutes(i as i64),
                })
                .unwrap();
        }

        let latest = store.latest_stats_snapshot("u@gmail.com").unwrap().unwrap();
        assert_eq!(latest.total_inbox, 2);

        let history = store.stats_history("u@gmail.com", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].total_inbox, 2);
    }
}
