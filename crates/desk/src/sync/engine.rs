//! Incremental sync engine driven by the provider's history log

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};

use crate::gmail::api::GmailMessage;
use crate::gmail::{normalize_summary, parse_received_at, GmailClient, HistoryExpiredError};
use crate::models::{CachedMessage, MessageId};
use crate::storage::DeskStore;

use super::delta::classify_history;
use super::historical::{self, label_records_for, ImportStats};

/// Statistics from applying one delta
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Number of messages added to the cache
    pub added: usize,
    /// Number of messages whose labels were reconciled
    pub modified: usize,
    /// Number of messages removed
    pub deleted: usize,
    /// Number of messages skipped for an unparsable date
    pub skipped: usize,
    /// Number of changed messages that could not be fetched
    pub errors: usize,
    /// Duration of the tick
    pub duration_ms: u64,
}

/// Result of one sync tick
#[derive(Debug)]
pub enum TickOutcome {
    /// First tick for this user; the cursor and label map were seeded
    Initialized,
    /// A previous tick is still running
    Skipped,
    /// The cursor had expired; label records were rebuilt from a fresh window
    Rebuilt(ImportStats),
    /// A delta was fetched and applied
    Delta(SyncStats),
}

/// Receives events as deltas are applied
///
/// Implementations are called from the sync thread and must not block for
/// long.
pub trait SyncListener: Send + Sync {
    /// A batch of new messages landed in the cache
    fn on_messages_added(&self, _messages: &[CachedMessage]) {}
    /// An added batch contained this many unread messages
    fn on_unread_added(&self, _count: usize) {}
}

/// Polls the provider's change log and reconciles the local stores.
///
/// One instance per user session. Re-entry is guarded with an in-memory
/// flag rather than a lock, so an overlapping tick returns
/// [`TickOutcome::Skipped`] instead of waiting.
pub struct SyncEngine {
    gmail: Arc<GmailClient>,
    store: Arc<dyn DeskStore>,
    user_email: String,
    in_flight: AtomicBool,
    label_names: RwLock<HashMap<String, String>>,
    listeners: Vec<Arc<dyn SyncListener>>,
}

impl SyncEngine {
    pub fn new(
        gmail: Arc<GmailClient>,
        store: Arc<dyn DeskStore>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            gmail,
            store,
            user_email: user_email.into(),
            in_flight: AtomicBool::new(false),
            label_names: RwLock::new(HashMap::new()),
            listeners: Vec::new(),
        }
    }

    /// Register a listener for applied deltas. Call before the first tick.
    pub fn add_listener(&mut self, listener: Arc<dyn SyncListener>) {
        self.listeners.push(listener);
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// Run one sync tick.
    ///
    /// Any unexpected failure is recorded on the user's sync status before
    /// it is returned; the caller keeps scheduling ticks regardless.
    pub fn tick(&self) -> Result<TickOutcome> {
        // Ticks can outlast the interval on a slow network
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(TickOutcome::Skipped);
        }

        let result = self.tick_inner();
        self.in_flight.store(false, Ordering::SeqCst);

        if let Err(err) = &result {
            warn!("Sync tick failed for {}: {:#}", self.user_email, err);
            let message = format!("{:#}", err);
            if let Err(store_err) = self.store.record_sync_error(&self.user_email, &message) {
                warn!("Failed to record sync error: {:#}", store_err);
            }
        }

        result
    }

    fn tick_inner(&self) -> Result<TickOutcome> {
        // 1. Load the cursor; a missing status means this user never synced
        let status = self.store.get_sync_status(&self.user_email)?;
        let Some(history_id) = status.and_then(|s| s.history_id) else {
            self.initialize()?;
            return Ok(TickOutcome::Initialized);
        };

        let start = std::time::Instant::now();

        // 2. Pull the change log since the cursor
        let response = match self.gmail.list_history_all(&history_id) {
            Ok(response) => response,
            Err(err) if err.is::<HistoryExpiredError>() => {
                let stats = self.rebuild_after_expired_cursor()?;
                return Ok(TickOutcome::Rebuilt(stats));
            }
            Err(err) => return Err(err),
        };

        let records = response.history.unwrap_or_default();
        let changes = classify_history(&records);

        // 3. Advance the cursor before applying anything. A failing message
        //    must not leave the same delta replaying on every tick, at the
        //    cost of dropping that message's change.
        if let Some(new_history_id) = &response.history_id {
            self.store
                .update_history_id(&self.user_email, new_history_id)?;
        }

        let mut stats = SyncStats::default();
        if changes.is_empty() {
            stats.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(TickOutcome::Delta(stats));
        }

        debug!(
            "Delta for {}: {} added, {} modified, {} deleted",
            self.user_email,
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len()
        );

        // 4. Fetch full details for added and modified messages
        let added = self.fetch_messages(&changes.added, &mut stats);
        let modified = self.fetch_messages(&changes.modified, &mut stats);

        // 5. Apply additions: cache, label records, listener notifications
        self.apply_added(&added, &mut stats)?;

        // 6. Apply label changes with delete-then-reinsert reconciliation
        self.apply_modified(&modified, &mut stats)?;

        // 7. Apply deletions
        for id in &changes.deleted {
            let message_id = MessageId::new(id.as_str());
            self.store
                .remove_cached_message(&self.user_email, &message_id)?;
            self.store
                .delete_label_records_for_message(&self.user_email, &message_id)?;
            stats.deleted += 1;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(TickOutcome::Delta(stats))
    }

    /// Seed the cursor from the current profile and build the label map.
    fn initialize(&self) -> Result<()> {
        info!("Initializing sync for {}", self.user_email);

        let profile = self.gmail.get_profile()?;
        self.store
            .upsert_sync_status(&self.user_email, &profile.history_id, None)?;
        self.refresh_label_names()?;
        Ok(())
    }

    /// Rebuild this user's label records after the provider dropped the
    /// cursor. The cursor is reset first so mail arriving during the
    /// rebuild is covered by the next delta; the window import itself is
    /// idempotent.
    fn rebuild_after_expired_cursor(&self) -> Result<ImportStats> {
        warn!(
            "History cursor expired for {}; rebuilding label records",
            self.user_email
        );

        let profile = self.gmail.get_profile()?;
        self.store
            .update_history_id(&self.user_email, &profile.history_id)?;

        self.store.delete_label_records_for_user(&self.user_email)?;
        self.run_historical_import()
    }

    /// Reload the label id-to-name map from the provider.
    pub fn refresh_label_names(&self) -> Result<()> {
        let labels = self.gmail.list_labels()?.labels.unwrap_or_default();
        let mut names = self.label_names.write().unwrap();
        names.clear();
        for label in labels {
            names.insert(label.id, label.name);
        }
        Ok(())
    }

    /// Run the historical window import with the session's label map.
    pub fn run_historical_import(&self) -> Result<ImportStats> {
        if self.label_names.read().unwrap().is_empty() {
            self.refresh_label_names()?;
        }
        let names = self.label_names.read().unwrap().clone();
        historical::run_historical_import(
            &self.gmail,
            self.store.as_ref(),
            &self.user_email,
            &names,
        )
    }

    /// Fetch full messages for a list of ids, dropping failures.
    fn fetch_messages(&self, ids: &[String], stats: &mut SyncStats) -> Vec<GmailMessage> {
        if ids.is_empty() {
            return Vec::new();
        }

        let message_ids: Vec<MessageId> = ids
            .iter()
            .map(|id| MessageId::new(id.as_str()))
            .collect();

        let mut messages = Vec::with_capacity(message_ids.len());
        for result in self.gmail.get_messages_parallel(&message_ids) {
            match result {
                Ok(message) => messages.push(message),
                Err(err) => {
                    warn!("Failed to fetch changed message: {:#}", err);
                    stats.errors += 1;
                }
            }
        }
        messages
    }

    fn apply_added(&self, messages: &[GmailMessage], stats: &mut SyncStats) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let summaries: Vec<CachedMessage> = messages
            .iter()
            .map(|message| normalize_summary(message, now))
            .collect();

        let unread = summaries.iter().filter(|m| !m.is_read).count();
        if unread > 0 {
            for listener in &self.listeners {
                listener.on_unread_added(unread);
            }
        }

        self.store.cache_messages(&self.user_email, &summaries)?;

        {
            let label_names = self.label_names.read().unwrap();
            for message in messages {
                let Some(received_date) = parse_received_at(message) else {
                    stats.skipped += 1;
                    continue;
                };
                let records = label_records_for(message, received_date, &label_names);
                self.store.save_label_records(&self.user_email, &records)?;
            }
        }

        for listener in &self.listeners {
            listener.on_messages_added(&summaries);
        }

        stats.added = summaries.len();
        Ok(())
    }

    fn apply_modified(&self, messages: &[GmailMessage], stats: &mut SyncStats) -> Result<()> {
        let now = Utc::now();
        let label_names = self.label_names.read().unwrap();

        for message in messages {
            let summary = normalize_summary(message, now);
            self.store
                .update_cached_message(&self.user_email, &summary)?;

            let message_id = MessageId::new(message.id.as_str());
            self.store
                .delete_label_records_for_message(&self.user_email, &message_id)?;

            if let Some(received_date) = parse_received_at(message) {
                let records = label_records_for(message, received_date, &label_names);
                self.store.save_label_records(&self.user_email, &records)?;
            } else {
                stats.skipped += 1;
            }
            stats.modified += 1;
        }

        Ok(())
    }
}
