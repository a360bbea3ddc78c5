//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow
//! - Gmail API client for messages, labels, history, watch and send
//! - Response normalization to domain models
//! - MIME assembly for outgoing mail

mod auth;
mod client;
mod mime;
mod normalize;

pub use auth::GmailAuth;
pub use client::{GmailClient, HistoryExpiredError};
pub use mime::{OutgoingMail, build_raw_message};
pub use normalize::{normalize_label, normalize_summary, parse_received_at, truncate_preview};
pub(crate) use normalize::extract_header;

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: String,
        pub label_ids: Option<Vec<String>>,
        #[serde(default)]
        pub snippet: String,
        pub internal_date: Option<String>,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body (may be base64 encoded, or reference an attachment)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// The authenticated user's mailbox profile
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
        pub messages_total: Option<u32>,
        pub threads_total: Option<u32>,
        pub history_id: String,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<GmailLabel>>,
    }

    /// A label as returned by the list or get endpoints
    ///
    /// Counts are only populated by the per-label get endpoint.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailLabel {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub label_type: Option<String>,
        pub messages_total: Option<u32>,
        pub messages_unread: Option<u32>,
        pub threads_total: Option<u32>,
        pub threads_unread: Option<u32>,
    }

    /// Response from the history list endpoint
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryResponse {
        pub history: Option<Vec<HistoryRecord>>,
        pub next_page_token: Option<String>,
        pub history_id: Option<String>,
    }

    /// One history record; each optional list covers one change type
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryRecord {
        pub id: Option<String>,
        pub messages: Option<Vec<MessageRef>>,
        pub messages_added: Option<Vec<HistoryMessageChange>>,
        pub messages_deleted: Option<Vec<HistoryMessageChange>>,
        pub labels_added: Option<Vec<HistoryLabelChange>>,
        pub labels_removed: Option<Vec<HistoryLabelChange>>,
    }

    /// A message added or deleted in a history record
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryMessageChange {
        pub message: MessageRef,
    }

    /// A label change on a message in a history record
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryLabelChange {
        pub message: MessageRef,
        pub label_ids: Option<Vec<String>>,
    }

    /// Response from starting a push-notification watch
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WatchResponse {
        pub history_id: String,
        /// Expiration as epoch milliseconds, returned as a string
        pub expiration: String,
    }

    /// Response from listing drafts
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListDraftsResponse {
        pub drafts: Option<Vec<DraftRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a draft
    #[derive(Debug, Deserialize)]
    pub struct DraftRef {
        pub id: String,
        pub message: Option<MessageRef>,
    }

    /// Response from sending a message
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendResponse {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
    }

    /// Response from fetching an attachment body
    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        pub size: Option<u32>,
        pub data: Option<String>,
    }
}
