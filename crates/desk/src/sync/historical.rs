//! One-time historical import of label associations
//!
//! Seeds the label-association store with a trailing window of mail so
//! aggregation queries have data before the incremental engine has seen
//! any deltas.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::gmail::api::GmailMessage;
use crate::gmail::{parse_received_at, GmailClient};
use crate::models::{LabelRecord, MessageId};
use crate::storage::DeskStore;

/// Trailing window of mail covered by one import run, in days
pub const HISTORICAL_WINDOW_DAYS: i64 = 90;

/// Maximum number of messages fetched per import run
pub const IMPORT_MESSAGE_CAP: usize = 500;

/// Label records written per storage call
const BULK_BATCH_SIZE: usize = 500;

/// Statistics from a historical import run
#[derive(Debug, Default, Clone)]
pub struct ImportStats {
    /// Number of messages fetched from the provider
    pub messages_fetched: usize,
    /// Number of label records written
    pub records_saved: usize,
    /// Number of messages skipped (fetch failed or date unparsable)
    pub messages_skipped: usize,
    /// Number of storage batches that failed
    pub failed_batches: usize,
    /// Duration of the import
    pub duration_ms: u64,
}

/// Import label associations for the trailing window.
///
/// Gated by the completion flag on `SyncStatus` in normal operation. The
/// flag is only set when every batch lands; a failed run records the error
/// and leaves it unset, so the next session repeats the whole window
/// rather than resuming a partial one.
pub fn run_historical_import(
    gmail: &GmailClient,
    store: &dyn DeskStore,
    user_email: &str,
    label_names: &HashMap<String, String>,
) -> Result<ImportStats> {
    store.mark_import_started(user_email)?;

    match import_window(gmail, store, user_email, label_names) {
        Ok(stats) => {
            store.mark_import_completed(user_email)?;
            info!(
                "Historical import completed for {}: {} messages, {} records saved",
                user_email, stats.messages_fetched, stats.records_saved
            );
            Ok(stats)
        }
        Err(err) => {
            let message = format!("{:#}", err);
            if let Err(store_err) = store.record_import_error(user_email, &message) {
                warn!("Failed to record import error: {:#}", store_err);
            }
            Err(err)
        }
    }
}

fn import_window(
    gmail: &GmailClient,
    store: &dyn DeskStore,
    user_email: &str,
    label_names: &HashMap<String, String>,
) -> Result<ImportStats> {
    let start = std::time::Instant::now();
    let mut stats = ImportStats::default();

    // 1. Fetch message ids for the trailing window
    let after = Utc::now() - Duration::days(HISTORICAL_WINDOW_DAYS);
    let response = gmail.list_messages_in_range(after, None, IMPORT_MESSAGE_CAP)?;
    let refs = response.messages.unwrap_or_default();
    stats.messages_fetched = refs.len();

    if refs.is_empty() {
        stats.duration_ms = start.elapsed().as_millis() as u64;
        return Ok(stats);
    }

    // 2. Fetch full details in parallel
    let ids: Vec<MessageId> = refs
        .iter()
        .map(|msg_ref| MessageId::new(msg_ref.id.as_str()))
        .collect();
    let results = gmail.get_messages_parallel(&ids);

    // 3. Flatten into one record per (message, label) pair
    let mut records: Vec<LabelRecord> = Vec::new();
    for result in results {
        match result {
            Ok(message) => {
                let Some(received_date) = parse_received_at(&message) else {
                    stats.messages_skipped += 1;
                    continue;
                };
                records.extend(label_records_for(&message, received_date, label_names));
            }
            Err(err) => {
                warn!("Failed to fetch historical message: {:#}", err);
                stats.messages_skipped += 1;
            }
        }
    }

    // 4. Bulk-save in batches, continuing past a failed batch so one bad
    //    batch does not discard the rest of the window
    save_batches(&mut stats, &records, |batch| {
        store.bulk_save_label_records(user_email, batch)
    })?;

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Build one label record per label on a message.
///
/// Label names come from the session's id-to-name map; an unknown id falls
/// back to the id itself.
pub(crate) fn label_records_for(
    message: &GmailMessage,
    received_date: DateTime<Utc>,
    label_names: &HashMap<String, String>,
) -> Vec<LabelRecord> {
    message
        .label_ids
        .iter()
        .flatten()
        .map(|label_id| {
            let label_name = label_names
                .get(label_id)
                .cloned()
                .unwrap_or_else(|| label_id.clone());
            LabelRecord::new(
                message.id.as_str(),
                label_id.as_str(),
                label_name,
                received_date,
            )
        })
        .collect()
}

/// Write records in fixed-size batches. Later batches still run after a
/// failure; the first error is returned once all batches were attempted.
fn save_batches<F>(stats: &mut ImportStats, records: &[LabelRecord], mut save: F) -> Result<()>
where
    F: FnMut(&[LabelRecord]) -> Result<usize>,
{
    let mut first_error = None;

    for batch in records.chunks(BULK_BATCH_SIZE) {
        match save(batch) {
            Ok(saved) => stats.records_saved += saved,
            Err(err) => {
                warn!("Failed to save import batch: {:#}", err);
                stats.failed_batches += 1;
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err.context(format!(
            "{} import batch(es) failed out of {}",
            stats.failed_batches,
            records.len().div_ceil(BULK_BATCH_SIZE)
        ))),
        None => Ok(()),
    }
}
