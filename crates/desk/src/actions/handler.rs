//! Action handler for message operations
//!
//! Coordinates between the Gmail API and local storage for mutations.

use anyhow::Result;
use log::info;
use std::sync::Arc;

use crate::gmail::api::SendResponse;
use crate::gmail::{build_raw_message, GmailClient, OutgoingMail};
use crate::models::{LabelId, MessageId};
use crate::storage::DeskStore;

use super::optimistic::{apply_optimistic, ItemAction, OptimisticUpdate};

/// Handler for message actions like star, read/unread, archive, trash
///
/// Read-state and mailbox moves are performed server-first:
/// 1. Call the Gmail API to update server state
/// 2. Patch local storage to reflect the change
///
/// Star and unstar are optimistic instead: local state flips immediately
/// and is reverted if the provider call fails.
pub struct ActionHandler {
    gmail: Arc<GmailClient>,
    store: Arc<dyn DeskStore>,
    user_email: String,
}

impl ActionHandler {
    pub fn new(
        gmail: Arc<GmailClient>,
        store: Arc<dyn DeskStore>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            gmail,
            store,
            user_email: user_email.into(),
        }
    }

    /// Mark a message as read (remove the UNREAD label)
    pub fn mark_read(&self, message_id: &MessageId) -> Result<()> {
        self.gmail
            .modify_message(message_id, &[], &[LabelId::UNREAD])?;
        self.patch_cached_labels(message_id, &[], &[LabelId::UNREAD])?;
        Ok(())
    }

    /// Mark a message as unread (add the UNREAD label)
    pub fn mark_unread(&self, message_id: &MessageId) -> Result<()> {
        self.gmail
            .modify_message(message_id, &[LabelId::UNREAD], &[])?;
        self.patch_cached_labels(message_id, &[LabelId::UNREAD], &[])?;
        Ok(())
    }

    /// Archive a message (remove it from INBOX)
    pub fn archive(&self, message_id: &MessageId) -> Result<()> {
        info!("Archiving message {}", message_id.as_str());

        self.gmail
            .modify_message(message_id, &[], &[LabelId::INBOX])?;
        self.patch_cached_labels(message_id, &[], &[LabelId::INBOX])?;
        Ok(())
    }

    /// Move a message to trash
    pub fn trash(&self, message_id: &MessageId) -> Result<()> {
        info!("Trashing message {}", message_id.as_str());

        self.gmail.trash_message(message_id)?;
        self.patch_cached_labels(message_id, &[LabelId::TRASH], &[LabelId::INBOX])?;
        Ok(())
    }

    /// Star a message, flipping local state before the provider call
    pub fn star(&self, message_id: &MessageId) -> Result<()> {
        let mut update = OptimisticUpdate::new();
        apply_optimistic(
            &mut update,
            ItemAction::Star,
            || {
                self.store.add_starred(&self.user_email, message_id)?;
                self.patch_cached_labels(message_id, &[LabelId::STARRED], &[])
            },
            || {
                self.gmail
                    .modify_message(message_id, &[LabelId::STARRED], &[])
            },
            || {
                if let Err(err) = self.store.remove_starred(&self.user_email, message_id) {
                    info!("Failed to revert starred flag: {:#}", err);
                }
                if let Err(err) =
                    self.patch_cached_labels(message_id, &[], &[LabelId::STARRED])
                {
                    info!("Failed to revert cached labels: {:#}", err);
                }
            },
        )?;

        info!("Starred message {}", message_id.as_str());
        Ok(())
    }

    /// Unstar a message, flipping local state before the provider call
    pub fn unstar(&self, message_id: &MessageId) -> Result<()> {
        let mut update = OptimisticUpdate::new();
        apply_optimistic(
            &mut update,
            ItemAction::Unstar,
            || {
                self.store.remove_starred(&self.user_email, message_id)?;
                self.patch_cached_labels(message_id, &[], &[LabelId::STARRED])
            },
            || {
                self.gmail
                    .modify_message(message_id, &[], &[LabelId::STARRED])
            },
            || {
                if let Err(err) = self.store.add_starred(&self.user_email, message_id) {
                    info!("Failed to revert starred flag: {:#}", err);
                }
                if let Err(err) =
                    self.patch_cached_labels(message_id, &[LabelId::STARRED], &[])
                {
                    info!("Failed to revert cached labels: {:#}", err);
                }
            },
        )?;

        info!("Unstarred message {}", message_id.as_str());
        Ok(())
    }

    /// Toggle star status for a message
    ///
    /// Returns the new starred state (true = starred).
    pub fn toggle_star(&self, message_id: &MessageId) -> Result<bool> {
        let starred_in_store = self.store.is_starred(&self.user_email, message_id)?;
        let starred_label = self
            .store
            .get_cached_message(&self.user_email, message_id)?
            .is_some_and(|m| m.label_ids.iter().any(|l| l == LabelId::STARRED));

        if starred_in_store || starred_label {
            self.unstar(message_id)?;
            Ok(false)
        } else {
            self.star(message_id)?;
            Ok(true)
        }
    }

    /// Mark a tracked SLA email resolved
    ///
    /// Returns false when the message is not tracked.
    pub fn resolve_sla(&self, message_id: &MessageId) -> Result<bool> {
        let resolved = self.store.resolve_sla_email(&self.user_email, message_id)?;
        if resolved {
            info!("Resolved SLA email {}", message_id.as_str());
        }
        Ok(resolved)
    }

    /// Remove a message from SLA tracking
    pub fn delete_sla(&self, message_id: &MessageId) -> Result<bool> {
        let deleted = self.store.delete_sla_email(&self.user_email, message_id)?;
        if deleted {
            info!("Removed SLA email {}", message_id.as_str());
        }
        Ok(deleted)
    }

    /// Send a message, optionally attached to an existing thread
    pub fn send(&self, mail: &OutgoingMail) -> Result<SendResponse> {
        info!("Sending message to {}", mail.to);

        let raw = build_raw_message(mail);
        let response = self.gmail.send_message(&raw, mail.thread_id.as_deref())?;

        info!("Sent message {}", response.id);
        Ok(response)
    }

    /// Patch the cached label set for a message. No-op when the message
    /// is not cached; the next sync delta carries the change anyway.
    fn patch_cached_labels(
        &self,
        message_id: &MessageId,
        add: &[&str],
        remove: &[&str],
    ) -> Result<()> {
        let Some(cached) = self.store.get_cached_message(&self.user_email, message_id)? else {
            return Ok(());
        };

        let mut label_ids = cached.label_ids;
        label_ids.retain(|label| !remove.contains(&label.as_str()));
        for label in add {
            if !label_ids.iter().any(|existing| existing == label) {
                label_ids.push((*label).to_string());
            }
        }

        self.store
            .update_cached_labels(&self.user_email, message_id, &label_ids)?;
        Ok(())
    }
}
