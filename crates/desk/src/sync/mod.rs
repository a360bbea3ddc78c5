//! Incremental sync engine and historical import
//!
//! Keeps the local cache and label-association store in step with the
//! provider's change log. Operations are idempotent and safe to retry.

mod delta;
mod engine;
mod historical;
mod timing;

pub use delta::{classify_history, ChangeSet};
pub use engine::{SyncEngine, SyncListener, SyncStats, TickOutcome};
pub use historical::{run_historical_import, ImportStats, HISTORICAL_WINDOW_DAYS, IMPORT_MESSAGE_CAP};
pub use timing::cooldown_elapsed;
