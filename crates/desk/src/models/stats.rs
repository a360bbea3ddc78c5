//! Mailbox statistics models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user-created label with its counts, as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomLabel {
    pub id: String,
    pub name: String,
    pub message_count: u32,
    pub unread_count: u32,
}

/// A full mailbox snapshot assembled from the provider's label details
///
/// `labels` maps label name to total message count for every label whose
/// detail fetch reported one. `custom_labels` is the user-created subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailStats {
    pub total_inbox: u32,
    pub unread_inbox: u32,
    pub drafts: u32,
    pub sent: u32,
    pub spam: u32,
    pub starred: u32,
    pub trash: u32,
    pub labels: HashMap<String, u32>,
    pub custom_labels: Vec<CustomLabel>,
}

/// One persisted stats row, appended on each refresh
///
/// Starred and trash counts are display-only and not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub user_email: String,
    pub total_inbox: u32,
    pub unread_inbox: u32,
    pub drafts: u32,
    pub sent: u32,
    pub spam: u32,
    pub custom_labels: Vec<CustomLabel>,
    pub created_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Build a snapshot row from live stats
    pub fn from_stats(user_email: impl Into<String>, stats: &GmailStats) -> Self {
        Self {
            user_email: user_email.into(),
            total_inbox: stats.total_inbox,
            unread_inbox: stats.unread_inbox,
            drafts: stats.drafts,
            sent: stats.sent,
            spam: stats.spam,
            custom_labels: stats.custom_labels.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregated email count for one label over some date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label_id: String,
    pub label_name: String,
    pub email_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_stats() {
        let mut stats = GmailStats {
            total_inbox: 120,
            unread_inbox: 4,
            drafts: 2,
            sent: 300,
            spam: 7,
            starred: 9,
            trash: 1,
            ..Default::default()
        };
        stats.custom_labels.push(CustomLabel {
            id: "Label_1".to_string(),
            name: "1: billing".to_string(),
            message_count: 15,
            unread_count: 2,
        });

        let snapshot = StatsSnapshot::from_stats("user@gmail.com", &stats);
        assert_eq!(snapshot.total_inbox, 120);
        assert_eq!(snapshot.unread_inbox, 4);
        assert_eq!(snapshot.custom_labels.len(), 1);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = GmailStats {
            total_inbox: 1,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"totalInbox\":1"));
        assert!(json.contains("\"customLabels\":[]"));
    }
}
