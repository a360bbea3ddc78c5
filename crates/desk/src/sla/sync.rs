//! SLA sync engine
//!
//! Mirrors support emails carrying the well-known SLA labels into the SLA
//! store. Designed to run once per session shortly after initialization,
//! with an explicit force path for user-triggered re-sync.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};

use crate::gmail::api::GmailMessage;
use crate::gmail::{extract_header, parse_received_at, truncate_preview, GmailClient};
use crate::models::{EmailAddress, MessageId, SlaEmail, SlaLabel};
use crate::storage::DeskStore;

/// Messages fetched per SLA label; only the first page is read
const SLA_PAGE_SIZE: usize = 50;

/// Counts from one SLA sync run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlaSyncStats {
    /// Rows newly written to the SLA store
    pub synced: usize,
    /// Messages that could not be extracted or saved
    pub errors: usize,
}

/// Which of the well-known SLA label names exist in the user's mailbox
#[derive(Debug, Clone)]
pub struct LabelCheck {
    pub available: Vec<String>,
    pub missing: Vec<String>,
}

/// Pulls labeled support mail into the SLA store.
///
/// Re-runs are cheap: every upsert collides on `(user, message)` and is
/// skipped, so a second run with no new provider-side mail reports zero
/// synced rows.
pub struct SlaSyncEngine {
    gmail: Arc<GmailClient>,
    store: Arc<dyn DeskStore>,
    user_email: String,
    synced_once: AtomicBool,
}

impl SlaSyncEngine {
    pub fn new(
        gmail: Arc<GmailClient>,
        store: Arc<dyn DeskStore>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            gmail,
            store,
            user_email: user_email.into(),
            synced_once: AtomicBool::new(false),
        }
    }

    /// Run one SLA sync.
    ///
    /// After a successful run the engine becomes a no-op unless `force` is
    /// set. A total pipeline failure (provider unreachable) is reported as
    /// a single error rather than propagated.
    pub fn sync(&self, force: bool) -> SlaSyncStats {
        if self.synced_once.load(Ordering::SeqCst) && !force {
            return SlaSyncStats::default();
        }

        match self.sync_inner() {
            Ok(stats) => {
                self.synced_once.store(true, Ordering::SeqCst);
                info!(
                    "SLA sync completed for {}: {} synced, {} errors",
                    self.user_email, stats.synced, stats.errors
                );
                stats
            }
            Err(err) => {
                warn!("SLA sync failed for {}: {:#}", self.user_email, err);
                SlaSyncStats {
                    synced: 0,
                    errors: 1,
                }
            }
        }
    }

    fn sync_inner(&self) -> Result<SlaSyncStats> {
        let mut stats = SlaSyncStats::default();

        // 1. Resolve which SLA labels exist in the user's mailbox
        let resolved = self.resolve_labels()?;
        if resolved.is_empty() {
            warn!(
                "No SLA labels found for {}; create them in Gmail to enable tracking",
                self.user_email
            );
            return Ok(stats);
        }

        for (sla_label, label_id) in &resolved {
            // 2. First page of messages carrying the label
            let messages = match self.fetch_label_messages(label_id) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(
                        "Failed to fetch messages for label {}: {:#}",
                        sla_label.name(),
                        err
                    );
                    continue;
                }
            };

            // 3. Extract and track each message; a bad message never
            //    aborts the batch
            for message in &messages {
                let Some(email) = self.extract_sla_email(message, *sla_label) else {
                    warn!("Failed to extract SLA fields from message {}", message.id);
                    stats.errors += 1;
                    continue;
                };

                // 4. First sighting wins; a conflict means already tracked
                match self.store.add_sla_email(&email) {
                    Ok(true) => stats.synced += 1,
                    Ok(false) => {
                        debug!("SLA email already tracked: {}", email.message_id.as_str())
                    }
                    Err(err) => {
                        warn!(
                            "Failed to save SLA email {}: {:#}",
                            email.message_id.as_str(),
                            err
                        );
                        stats.errors += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Report which SLA labels the user has created and which are missing.
    pub fn check_labels(&self) -> Result<LabelCheck> {
        let resolved = self.resolve_labels()?;

        let available: Vec<String> = resolved
            .iter()
            .map(|(label, _)| label.name().to_string())
            .collect();
        let missing: Vec<String> = SlaLabel::ALL
            .iter()
            .filter(|label| !resolved.iter().any(|(found, _)| found == *label))
            .map(|label| label.name().to_string())
            .collect();

        Ok(LabelCheck { available, missing })
    }

    /// Match the well-known label names against the user's labels.
    ///
    /// Matching is exact and case-sensitive.
    fn resolve_labels(&self) -> Result<Vec<(SlaLabel, String)>> {
        let labels = self.gmail.list_labels()?.labels.unwrap_or_default();

        let mut resolved = Vec::new();
        for sla_label in SlaLabel::ALL {
            if let Some(label) = labels.iter().find(|l| l.name == sla_label.name()) {
                resolved.push((sla_label, label.id.clone()));
            }
        }
        Ok(resolved)
    }

    fn fetch_label_messages(&self, label_id: &str) -> Result<Vec<GmailMessage>> {
        let response = self.gmail.list_messages(Some(label_id), SLA_PAGE_SIZE, None)?;
        let refs = response.messages.unwrap_or_default();
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<MessageId> = refs
            .iter()
            .map(|msg_ref| MessageId::new(msg_ref.id.as_str()))
            .collect();

        let mut messages = Vec::with_capacity(ids.len());
        for result in self.gmail.get_messages_parallel(&ids) {
            match result {
                Ok(message) => messages.push(message),
                Err(err) => warn!("Failed to fetch SLA message: {:#}", err),
            }
        }
        Ok(messages)
    }

    /// Build a trackable row from a full message. None when the received
    /// date cannot be derived; the sender falls back to "Unknown" and the
    /// subject to "(No subject)".
    fn extract_sla_email(&self, message: &GmailMessage, label: SlaLabel) -> Option<SlaEmail> {
        let received_at = parse_received_at(message)?;

        let email_address = message
            .payload
            .as_ref()
            .and_then(|payload| extract_header(payload, "From"))
            .map(|from| EmailAddress::parse(&from).email)
            .unwrap_or_else(|| "Unknown".to_string());

        let subject = message
            .payload
            .as_ref()
            .and_then(|payload| extract_header(payload, "Subject"))
            .unwrap_or_else(|| "(No subject)".to_string());

        Some(SlaEmail::new(
            &self.user_email,
            MessageId::new(message.id.as_str()),
            email_address,
            subject,
            truncate_preview(&message.snippet),
            label,
            received_at,
        ))
    }
}
