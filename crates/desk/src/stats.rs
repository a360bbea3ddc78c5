//! Mailbox statistics collection
//!
//! Assembles a live snapshot from the provider's per-label counts and
//! appends it to the stats history.

use anyhow::Result;
use log::debug;

use crate::gmail::GmailClient;
use crate::models::{CustomLabel, GmailStats, LabelId, StatsSnapshot};
use crate::storage::DeskStore;

/// Days of stats history kept per user
pub const STATS_RETENTION_DAYS: i64 = 30;

/// Collect a live stats snapshot from the provider.
///
/// Counts come from the per-label detail endpoint; a label whose detail
/// fetch failed simply contributes no counts. The drafts count degrades
/// to zero on failure rather than failing the whole snapshot.
pub fn collect_stats(gmail: &GmailClient) -> Result<GmailStats> {
    let labels = gmail.get_labels_detailed()?;
    let drafts = drafts_count(gmail);

    let mut stats = GmailStats {
        drafts,
        ..Default::default()
    };

    for label in &labels {
        match label.id.as_str() {
            LabelId::INBOX => {
                stats.total_inbox = label.messages_total.unwrap_or(0);
                stats.unread_inbox = label.messages_unread.unwrap_or(0);
            }
            LabelId::SENT => stats.sent = label.messages_total.unwrap_or(0),
            LabelId::SPAM => stats.spam = label.messages_total.unwrap_or(0),
            LabelId::STARRED => stats.starred = label.messages_total.unwrap_or(0),
            LabelId::TRASH => stats.trash = label.messages_total.unwrap_or(0),
            _ => {}
        }

        if let Some(total) = label.messages_total {
            stats.labels.insert(label.name.clone(), total);
        }
    }

    stats.custom_labels = labels
        .iter()
        .filter(|label| label.label_type.as_deref() == Some("user"))
        .filter(|label| label.messages_total.is_some())
        .map(|label| CustomLabel {
            id: label.id.clone(),
            name: label.name.clone(),
            message_count: label.messages_total.unwrap_or(0),
            unread_count: label.messages_unread.unwrap_or(0),
        })
        .collect();

    Ok(stats)
}

/// Collect live stats, persist a snapshot row and prune old history.
pub fn refresh_stats(
    gmail: &GmailClient,
    store: &dyn DeskStore,
    user_email: &str,
) -> Result<GmailStats> {
    let stats = collect_stats(gmail)?;

    let snapshot = StatsSnapshot::from_stats(user_email, &stats);
    store.insert_stats_snapshot(&snapshot)?;

    let pruned = store.delete_old_stats(user_email, STATS_RETENTION_DAYS)?;
    if pruned > 0 {
        debug!("Pruned {} old stats rows for {}", pruned, user_email);
    }

    Ok(stats)
}

fn drafts_count(gmail: &GmailClient) -> u32 {
    match gmail.list_drafts(100) {
        Ok(response) => response.drafts.map(|drafts| drafts.len() as u32).unwrap_or(0),
        Err(_) => 0,
    }
}
