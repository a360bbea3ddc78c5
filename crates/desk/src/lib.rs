//! Desk crate - core logic for the mail dashboard
//!
//! This crate provides UI-independent dashboard functionality including:
//! - Domain models (CachedMessage, SyncStatus, SlaEmail, GmailStats)
//! - Gmail API client and OAuth authentication
//! - Storage trait abstractions over SQLite
//! - Incremental sync engine with historical import
//! - SLA tracking with a pure progress calculator
//! - Action handlers for mutations (star, read/unread, archive, trash)
//! - Stats collection and the outbound automation webhook

pub mod actions;
pub mod credentials;
pub mod dates;
pub mod gmail;
pub mod models;
pub mod sla;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod webhook;

pub use actions::{ActionHandler, ActionState, ItemAction, OptimisticUpdate};
pub use credentials::GmailCredentials;
pub use gmail::{api::ProfileResponse, GmailAuth, GmailClient, HistoryExpiredError, OutgoingMail};
pub use models::{
    CachedMessage, CustomLabel, EmailAddress, EmailPreferences, GmailStats, Label, LabelCount,
    LabelId, LabelRecord, MessageId, PreferencesUpdate, SlaEmail, SlaLabel, SlaProgress,
    SlaStatus, StatsSnapshot, SyncStatus,
};
pub use sla::{compute_progress, compute_status, LabelCheck, SlaSyncEngine, SlaSyncStats};
pub use storage::{DeskStore, InMemoryDeskStore, SqliteDeskStore, MAX_CACHED_MESSAGES};
pub use sync::{
    // Sync execution
    SyncEngine, SyncListener, SyncStats, TickOutcome,
    // Historical import
    run_historical_import, ImportStats, HISTORICAL_WINDOW_DAYS, IMPORT_MESSAGE_CAP,
    // Sync timing (for scheduler cooldown management)
    cooldown_elapsed,
};
pub use webhook::{EmailField, WebhookClient};
