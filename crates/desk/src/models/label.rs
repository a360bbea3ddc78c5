//! Label model representing a Gmail label/folder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Well-known Gmail system labels
    pub const INBOX: &'static str = "INBOX";
    pub const SENT: &'static str = "SENT";
    pub const DRAFTS: &'static str = "DRAFT";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
    pub const STARRED: &'static str = "STARRED";
    pub const IMPORTANT: &'static str = "IMPORTANT";
    pub const UNREAD: &'static str = "UNREAD";
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A mail label with counts from the provider's per-label detail endpoint
///
/// Counts are None when the detail fetch failed and only the bare list
/// entry is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "SENT", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
    /// Whether this is a system label (as opposed to a user-created one)
    pub is_system: bool,
    /// Number of messages with this label
    pub messages_total: Option<u32>,
    /// Number of unread messages with this label
    pub messages_unread: Option<u32>,
}

impl Label {
    /// Create a user label with no counts
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: false,
            messages_total: None,
            messages_unread: None,
        }
    }

    /// Create a system label with no counts
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: true,
            messages_total: None,
            messages_unread: None,
        }
    }

    /// Builder method to set message counts
    pub fn with_counts(mut self, total: u32, unread: u32) -> Self {
        self.messages_total = Some(total);
        self.messages_unread = Some(unread);
        self
    }

    /// Whether this is a user-created label
    pub fn is_user(&self) -> bool {
        !self.is_system
    }
}

/// One (message, label) membership row for a user's account
///
/// The label name is denormalized at write time so aggregations do not
/// need a labels table join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Message the label is attached to
    pub message_id: MessageId,
    /// Provider label ID (e.g., "Label_123")
    pub label_id: String,
    /// Display name at the time the record was written
    pub label_name: String,
    /// When the message was received
    pub received_date: DateTime<Utc>,
}

impl LabelRecord {
    pub fn new(
        message_id: impl Into<MessageId>,
        label_id: impl Into<String>,
        label_name: impl Into<String>,
        received_date: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            label_id: label_id.into(),
            label_name: label_name.into(),
            received_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_label() {
        let label = Label::new("Label_7", "support").with_counts(12, 3);
        assert!(label.is_user());
        assert_eq!(label.messages_total, Some(12));
        assert_eq!(label.messages_unread, Some(3));
    }

    #[test]
    fn test_system_label() {
        let label = Label::system(LabelId::INBOX, "INBOX");
        assert!(!label.is_user());
        assert!(label.messages_total.is_none());
    }
}
