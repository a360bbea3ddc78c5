//! Domain models for dashboard entities

mod label;
mod message;
mod preferences;
mod sla;
mod stats;
mod sync_status;

pub use label::{Label, LabelId, LabelRecord};
pub use message::{CachedMessage, EmailAddress, MessageId};
pub use preferences::{EmailPreferences, PreferencesUpdate};
pub use sla::{SlaEmail, SlaLabel, SlaProgress, SlaStatus};
pub use stats::{CustomLabel, GmailStats, LabelCount, StatsSnapshot};
pub use sync_status::SyncStatus;
