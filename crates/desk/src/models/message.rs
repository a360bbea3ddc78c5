//! Message model representing a cached Gmail message summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        // Try to parse "Name <email>" format
        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        // Otherwise, treat the whole string as an email
        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A message summary held in the bounded local cache
///
/// The cache is keyed by (user, message id) and bounded per user; when the
/// cap is exceeded, entries are evicted oldest-cached-first. `cached_at`
/// records when the entry was written, not when the mail arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMessage {
    /// Gmail message ID
    pub id: MessageId,
    /// ID of the thread this message belongs to
    pub thread_id: String,
    /// Short text preview from the provider
    pub snippet: String,
    /// Sender's email address
    pub from: EmailAddress,
    /// Subject line
    pub subject: String,
    /// When the message was received; None when neither the Date header
    /// nor the internal timestamp could be parsed
    pub received_at: Option<DateTime<Utc>>,
    /// Pre-formatted date for display ("5m ago", "2d ago", "Jan 3")
    pub display_date: String,
    /// Whether the message has been read (no UNREAD label)
    pub is_read: bool,
    /// Whether any part carries a filename
    pub has_attachments: bool,
    /// Gmail label IDs on the message
    pub label_ids: Vec<String>,
    /// Whether the STARRED label is present
    pub is_starred: bool,
    /// When this cache entry was written
    pub cached_at: DateTime<Utc>,
}

impl CachedMessage {
    /// Create a new cached message builder
    pub fn builder(id: MessageId, thread_id: impl Into<String>) -> CachedMessageBuilder {
        CachedMessageBuilder::new(id, thread_id.into())
    }
}

/// Builder for creating CachedMessage instances
pub struct CachedMessageBuilder {
    id: MessageId,
    thread_id: String,
    snippet: String,
    from: Option<EmailAddress>,
    subject: String,
    received_at: Option<DateTime<Utc>>,
    display_date: String,
    is_read: bool,
    has_attachments: bool,
    label_ids: Vec<String>,
    is_starred: bool,
    cached_at: Option<DateTime<Utc>>,
}

impl CachedMessageBuilder {
    fn new(id: MessageId, thread_id: String) -> Self {
        Self {
            id,
            thread_id,
            snippet: String::new(),
            from: None,
            subject: String::new(),
            received_at: None,
            display_date: String::new(),
            is_read: true,
            has_attachments: false,
            label_ids: Vec::new(),
            is_starred: false,
            cached_at: None,
        }
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.from = Some(from);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn display_date(mut self, display_date: impl Into<String>) -> Self {
        self.display_date = display_date.into();
        self
    }

    pub fn is_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    pub fn has_attachments(mut self, has_attachments: bool) -> Self {
        self.has_attachments = has_attachments;
        self
    }

    pub fn label_ids(mut self, label_ids: Vec<String>) -> Self {
        self.label_ids = label_ids;
        self
    }

    pub fn is_starred(mut self, is_starred: bool) -> Self {
        self.is_starred = is_starred;
        self
    }

    pub fn cached_at(mut self, cached_at: DateTime<Utc>) -> Self {
        self.cached_at = Some(cached_at);
        self
    }

    pub fn build(self) -> CachedMessage {
        CachedMessage {
            id: self.id,
            thread_id: self.thread_id,
            snippet: self.snippet,
            from: self
                .from
                .unwrap_or_else(|| EmailAddress::new("unknown@unknown.com")),
            subject: self.subject,
            received_at: self.received_at,
            display_date: self.display_date,
            is_read: self.is_read,
            has_attachments: self.has_attachments,
            label_ids: self.label_ids,
            is_starred: self.is_starred,
            cached_at: self.cached_at.unwrap_or_else(Utc::now),
        }
    }
}
