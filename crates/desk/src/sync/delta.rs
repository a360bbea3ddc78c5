//! Classification of provider history records into a change set
//!
//! Pure functions so the reconciliation rules can be tested without a
//! network client.

use std::collections::HashSet;

use crate::gmail::api::HistoryRecord;

/// Message ids changed since the last cursor, each id in exactly one bucket
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    /// Messages that appeared since the cursor
    pub added: Vec<String>,
    /// Messages whose label set changed
    pub modified: Vec<String>,
    /// Messages removed from the mailbox
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Whether the change set carries no work
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Classify history records into added, modified and deleted message ids.
///
/// Events are applied in record order. A delete following an add within the
/// same batch cancels the add instead of producing a delete, since the
/// message was never visible locally. A label change only counts as a
/// modification when the message is not already added or deleted in the
/// same batch; the add or delete path re-reads the full label set anyway.
pub fn classify_history(records: &[HistoryRecord]) -> ChangeSet {
    let mut added: Vec<String> = Vec::new();
    let mut modified: Vec<String> = Vec::new();
    let mut deleted: Vec<String> = Vec::new();

    let mut added_ids: HashSet<String> = HashSet::new();
    let mut modified_ids: HashSet<String> = HashSet::new();
    let mut deleted_ids: HashSet<String> = HashSet::new();

    for record in records {
        for change in record.messages_added.iter().flatten() {
            let id = &change.message.id;
            if deleted_ids.remove(id) {
                deleted.retain(|existing| existing != id);
            }
            if added_ids.insert(id.clone()) {
                added.push(id.clone());
            }
        }

        for change in record.messages_deleted.iter().flatten() {
            let id = &change.message.id;
            if added_ids.remove(id) {
                // Added and deleted in the same batch: nothing to do locally
                added.retain(|existing| existing != id);
            } else if deleted_ids.insert(id.clone()) {
                deleted.push(id.clone());
            }
            if modified_ids.remove(id) {
                modified.retain(|existing| existing != id);
            }
        }

        for change in record
            .labels_added
            .iter()
            .flatten()
            .chain(record.labels_removed.iter().flatten())
        {
            let id = &change.message.id;
            if !added_ids.contains(id)
                && !deleted_ids.contains(id)
                && modified_ids.insert(id.clone())
            {
                modified.push(id.clone());
            }
        }
    }

    ChangeSet {
        added,
        modified,
        deleted,
    }
}
