//! SLA tracking for labeled support mail
//!
//! Support emails carrying one of the well-known labels are mirrored into
//! the SLA store once, then judged against their label's resolution window
//! by a pure calculator.

mod progress;
mod sync;

pub use progress::{compute_progress, compute_status, format_time_remaining, hours_between};
pub use sync::{LabelCheck, SlaSyncEngine, SlaSyncStats};
