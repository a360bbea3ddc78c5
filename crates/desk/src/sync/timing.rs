//! Tick gating for the scheduler loop
//!
//! The daemon wakes far more often than any engine should run; this
//! decides, per concern, whether a wakeup turns into work.

use chrono::{DateTime, Utc};

/// Whether a cooldown window has passed at `now`.
///
/// `last_run` is when the concern last ran (`None` means never, which
/// always allows a run). Callers pass the wakeup's own clock reading so
/// every concern in one wakeup is judged against the same instant.
pub fn cooldown_elapsed(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_secs: u64,
) -> bool {
    let Some(last) = last_run else {
        return true;
    };
    (now - last).num_seconds() >= cooldown_secs as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_never_run_always_elapses() {
        let now = Utc::now();
        assert!(cooldown_elapsed(None, now, 15));
        assert!(cooldown_elapsed(None, now, 0));
        assert!(cooldown_elapsed(None, now, 3600));
    }

    #[test]
    fn test_inside_the_window() {
        let now = Utc::now();
        assert!(!cooldown_elapsed(Some(now - Duration::seconds(5)), now, 15));
        assert!(!cooldown_elapsed(Some(now - Duration::seconds(14)), now, 15));
    }

    #[test]
    fn test_boundary_counts_as_elapsed() {
        let now = Utc::now();
        assert!(cooldown_elapsed(Some(now - Duration::seconds(15)), now, 15));
        assert!(cooldown_elapsed(Some(now - Duration::seconds(60)), now, 15));
    }

    #[test]
    fn test_zero_cooldown_always_elapses() {
        let now = Utc::now();
        assert!(cooldown_elapsed(Some(now), now, 0));
    }

    #[test]
    fn test_future_last_run_blocks() {
        // A last-run timestamp ahead of the clock blocks until the clock
        // catches up rather than firing immediately.
        let now = Utc::now();
        assert!(!cooldown_elapsed(Some(now + Duration::seconds(30)), now, 15));
    }
}
