//! Gmail API HTTP client
//!
//! Provides methods for reading mailbox state (profile, labels, messages,
//! history) and performing mutations (modify, trash, send, watch).
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Duration;

use super::api::{
    AttachmentResponse, GmailLabel, GmailMessage, HistoryResponse, ListDraftsResponse,
    ListLabelsResponse, ListMessagesResponse, ProfileResponse, SendResponse, WatchResponse,
};
use super::GmailAuth;
use crate::models::MessageId;

/// Error indicating the history ID has expired
#[derive(Debug, thiserror::Error)]
#[error("History ID expired or invalid")]
pub struct HistoryExpiredError;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// Get the authenticated user's profile (address, counts, history id)
    pub fn get_profile(&self) -> Result<ProfileResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/profile", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send profile request")?;

        let profile: ProfileResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse profile response")?;

        Ok(profile)
    }

    /// List message IDs from the user's mailbox
    ///
    /// # Arguments
    /// * `label_id` - Optional label to restrict the listing to
    /// * `max_results` - Maximum number of messages to return per page (1-500)
    /// * `page_token` - Optional page token for pagination
    pub fn list_messages(
        &self,
        label_id: Option<&str>,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/messages?maxResults={}",
            Self::BASE_URL,
            max_results.min(500)
        );

        if let Some(label) = label_id {
            url.push_str(&format!("&labelIds={}", urlencoding::encode(label)));
        }

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    /// Search message IDs with a Gmail query string
    pub fn search_messages(&self, query: &str, max_results: usize) -> Result<ListMessagesResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages?q={}&maxResults={}",
            Self::BASE_URL,
            urlencoding::encode(query),
            max_results.min(500)
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send search request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse search response")?;

        Ok(list)
    }

    /// List message IDs received within a date range
    ///
    /// The range is expressed with Gmail's `after:`/`before:` query
    /// operators, which take epoch seconds.
    pub fn list_messages_in_range(
        &self,
        after: chrono::DateTime<chrono::Utc>,
        before: Option<chrono::DateTime<chrono::Utc>>,
        max_results: usize,
    ) -> Result<ListMessagesResponse> {
        let mut query = format!("after:{}", after.timestamp());
        if let Some(before) = before {
            query.push_str(&format!(" before:{}", before.timestamp()));
        }
        self.search_messages(&query, max_results)
    }

    /// Get full message details by ID
    ///
    /// # Arguments
    /// * `id` - The message ID to fetch
    pub fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            id.as_str()
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send get message request")?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")?;

        Ok(message)
    }

    /// Get multiple messages sequentially with retry logic
    ///
    /// # Arguments
    /// * `ids` - The message IDs to fetch
    pub fn get_messages_batch(&self, ids: &[MessageId]) -> Vec<Result<GmailMessage>> {
        ids.iter()
            .map(|id| self.get_message_with_retry(id, 3))
            .collect()
    }

    /// Get multiple messages in parallel with retry logic
    ///
    /// Used where the caller fans out a large detail fetch (historical
    /// import, per-label stats). Results keep the input order.
    pub fn get_messages_parallel(&self, ids: &[MessageId]) -> Vec<Result<GmailMessage>> {
        ids.par_iter()
            .map(|id| self.get_message_with_retry(id, 3))
            .collect()
    }

    /// Get a message with exponential backoff retry
    fn get_message_with_retry(&self, id: &MessageId, max_retries: u32) -> Result<GmailMessage> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..max_retries {
            match self.get_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        // Add jitter to delay
                        let jitter = Duration::from_millis(rand_jitter());
                        std::thread::sleep(delay + jitter);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }

    /// Check if the client is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Trigger authentication flow
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }

    /// Get a raw access token for callers that need to pass it along
    /// (the workflow webhook payload embeds one)
    pub fn access_token(&self) -> Result<String> {
        self.auth.get_access_token()
    }

    /// Clear stored tokens
    pub fn logout(&self) -> Result<()> {
        self.auth.logout()
    }

    // === Labels API ===

    /// List all labels (folders) in the user's mailbox
    ///
    /// The list endpoint omits counts; use [`get_label`] for those.
    pub fn list_labels(&self) -> Result<ListLabelsResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(labels)
    }

    /// Get one label with its message/unread counts
    pub fn get_label(&self, label_id: &str) -> Result<GmailLabel> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/labels/{}",
            Self::BASE_URL,
            urlencoding::encode(label_id)
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send get label request")?;

        let label: GmailLabel = response
            .body_mut()
            .read_json()
            .context("Failed to parse label response")?;

        Ok(label)
    }

    /// List all labels with counts filled in from the per-label endpoint
    ///
    /// Detail fetches run in parallel; a failed detail falls back to the
    /// bare list entry rather than dropping the label.
    pub fn get_labels_detailed(&self) -> Result<Vec<GmailLabel>> {
        let bare = self.list_labels()?.labels.unwrap_or_default();

        let detailed: Vec<GmailLabel> = bare
            .into_par_iter()
            .map(|label| match self.get_label(&label.id) {
                Ok(detail) => detail,
                Err(e) => {
                    log::warn!("Failed to fetch detail for label {}: {}", label.id, e);
                    label
                }
            })
            .collect();

        Ok(detailed)
    }

    // === Mutations ===

    /// Add and/or remove labels on a message
    pub fn modify_message(
        &self,
        id: &MessageId,
        add_label_ids: &[&str],
        remove_label_ids: &[&str],
    ) -> Result<GmailMessage> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/modify",
            Self::BASE_URL,
            id.as_str()
        );

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(serde_json::json!({
                "addLabelIds": add_label_ids,
                "removeLabelIds": remove_label_ids,
            }))
            .context("Failed to send modify message request")?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse modify response")?;

        Ok(message)
    }

    /// Move a message to the trash
    pub fn trash_message(&self, id: &MessageId) -> Result<()> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/trash",
            Self::BASE_URL,
            id.as_str()
        );

        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_empty()
            .context("Failed to send trash message request")?;

        Ok(())
    }

    /// Send a MIME message, already base64url-encoded
    ///
    /// # Arguments
    /// * `raw` - base64url-encoded RFC 2822 message
    /// * `thread_id` - Optional thread to attach the reply to
    pub fn send_message(&self, raw: &str, thread_id: Option<&str>) -> Result<SendResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/messages/send", Self::BASE_URL);

        let mut body = serde_json::json!({ "raw": raw });
        if let Some(thread_id) = thread_id {
            body["threadId"] = serde_json::Value::String(thread_id.to_string());
        }

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(body)
            .context("Failed to send message")?;

        let sent: SendResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse send response")?;

        Ok(sent)
    }

    /// Fetch an attachment body (base64url data)
    pub fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<String> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/attachments/{}",
            Self::BASE_URL,
            message_id.as_str(),
            urlencoding::encode(attachment_id)
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send attachment request")?;

        let attachment: AttachmentResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse attachment response")?;

        attachment.data.context("Attachment has no data")
    }

    /// List drafts (used for the drafts count on the dashboard)
    pub fn list_drafts(&self, max_results: usize) -> Result<ListDraftsResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/drafts?maxResults={}",
            Self::BASE_URL,
            max_results.min(500)
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list drafts request")?;

        let drafts: ListDraftsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse drafts response")?;

        Ok(drafts)
    }

    // === History API ===

    /// List history since a given historyId
    ///
    /// Returns message and label changes since the specified historyId.
    /// Used for incremental sync.
    ///
    /// # Arguments
    /// * `start_history_id` - The history ID to start from (from previous sync)
    /// * `page_token` - Optional page token for pagination
    ///
    /// # Errors
    /// Returns `HistoryExpiredError` if the history ID is too old (404 from Gmail)
    pub fn list_history(
        &self,
        start_history_id: &str,
        page_token: Option<&str>,
    ) -> Result<HistoryResponse> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/history?startHistoryId={}&historyTypes=messageAdded,messageDeleted,labelAdded,labelRemoved",
            Self::BASE_URL,
            start_history_id
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        match response {
            Ok(mut resp) => {
                let history: HistoryResponse = resp
                    .body_mut()
                    .read_json()
                    .context("Failed to parse history response")?;
                Ok(history)
            }
            Err(ureq::Error::StatusCode(404)) => {
                // History ID expired or invalid
                Err(HistoryExpiredError.into())
            }
            Err(e) => Err(anyhow::anyhow!("Failed to fetch history: {}", e)),
        }
    }

    /// List all history pages since a given historyId
    ///
    /// Automatically handles pagination to fetch all history records.
    pub fn list_history_all(&self, start_history_id: &str) -> Result<HistoryResponse> {
        let mut all_records = Vec::new();
        let mut final_history_id = None;
        let mut page_token = None;

        loop {
            let response = self.list_history(start_history_id, page_token.as_deref())?;

            // Collect history records
            if let Some(records) = response.history {
                all_records.extend(records);
            }

            // Update final history ID
            if response.history_id.is_some() {
                final_history_id = response.history_id;
            }

            // Check for next page
            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(HistoryResponse {
            history_id: final_history_id,
            history: if all_records.is_empty() {
                None
            } else {
                Some(all_records)
            },
            next_page_token: None,
        })
    }

    // === Watch API ===

    /// Start a push-notification watch on the inbox
    ///
    /// # Arguments
    /// * `topic_name` - Pub/Sub topic to deliver notifications to
    pub fn watch(&self, topic_name: &str) -> Result<WatchResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/watch", Self::BASE_URL);

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(serde_json::json!({
                "topicName": topic_name,
                "labelIds": ["INBOX"],
                "labelFilterAction": "include",
            }))
            .context("Failed to send watch request")?;

        let watch: WatchResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse watch response")?;

        Ok(watch)
    }

    /// Stop the push-notification watch
    pub fn stop_watch(&self) -> Result<()> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/stop", Self::BASE_URL);

        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_empty()
            .context("Failed to send stop watch request")?;

        Ok(())
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
