//! Pure SLA progress calculation
//!
//! All functions take the reference time as a parameter. Unresolved rows
//! are wall-clock-relative, so callers re-evaluate on a timer.

use chrono::{DateTime, Utc};

use crate::models::{SlaEmail, SlaProgress, SlaStatus};

/// Fractional hours between two instants
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

/// Where an email sits relative to its SLA window at `now`.
///
/// A resolved row is always `Resolved`, regardless of when it was
/// resolved relative to the window.
pub fn compute_status(email: &SlaEmail, now: DateTime<Utc>) -> SlaStatus {
    if email.resolved {
        return SlaStatus::Resolved;
    }

    let elapsed = hours_between(email.received_at, now);
    if elapsed >= email.label.sla_hours() {
        SlaStatus::Breached
    } else if elapsed >= email.label.on_track_hours() {
        SlaStatus::Warning
    } else {
        SlaStatus::OnTrack
    }
}

/// Full progress snapshot for one email at `now`.
///
/// For resolved rows the elapsed time is frozen at the resolution
/// timestamp; everything else ticks against `now`.
pub fn compute_progress(email: &SlaEmail, now: DateTime<Utc>) -> SlaProgress {
    let end = match (email.resolved, email.resolved_at) {
        (true, Some(resolved_at)) => resolved_at,
        _ => now,
    };
    let elapsed = hours_between(email.received_at, end);

    let sla_hours = email.label.sla_hours();
    let remaining = (sla_hours - elapsed).max(0.0);
    let fraction = (elapsed / sla_hours).min(1.0);
    let on_track_fraction = email.label.on_track_hours() / sla_hours;
    let status = compute_status(email, now);

    let time_remaining_text = match status {
        SlaStatus::Resolved => "Resolved".to_string(),
        SlaStatus::Breached => "Breached".to_string(),
        _ => format_time_remaining(remaining),
    };

    SlaProgress {
        status,
        elapsed_hours: elapsed,
        remaining_hours: remaining,
        fraction,
        on_track_fraction,
        time_remaining_text,
    }
}

/// Format a countdown like "1h 30m left", dropping the hour part at zero
pub fn format_time_remaining(hours: f64) -> String {
    if hours <= 0.0 {
        return "0h 0m left".to_string();
    }

    let h = hours.floor() as i64;
    let m = ((hours - hours.floor()) * 60.0).round() as i64;

    if h == 0 {
        format!("{}m left", m)
    } else {
        format!("{}h {}m left", h, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, SlaLabel};
    use chrono::{Duration, TimeZone};

    fn make_email(label: SlaLabel) -> SlaEmail {
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        SlaEmail::new(
            "user@gmail.com",
            MessageId::new("msg-1"),
            "customer@example.com",
            "Card was charged twice",
            "Hi, I noticed a duplicate charge on my statement",
            label,
            received,
        )
    }

    fn rank(status: SlaStatus) -> u8 {
        match status {
            SlaStatus::OnTrack => 0,
            SlaStatus::Warning => 1,
            SlaStatus::Breached => 2,
            SlaStatus::Resolved => 3,
        }
    }

    #[test]
    fn test_status_progression_is_monotonic() {
        // As the clock advances on an unresolved row, the status only ever
        // moves forward through On Track, Warning, Breached.
        let email = make_email(SlaLabel::Billing);
        let mut previous = 0;

        for minutes in (0..=480).step_by(10) {
            let now = email.received_at + Duration::minutes(minutes);
            let current = rank(compute_status(&email, now));
            assert!(
                current >= previous,
                "status went backwards at +{}m",
                minutes
            );
            previous = current;
        }
    }

    #[test]
    fn test_status_thresholds() {
        let email = make_email(SlaLabel::Billing);

        let now = email.received_at + Duration::hours(1);
        assert_eq!(compute_status(&email, now), SlaStatus::OnTrack);

        // Exactly at the on-track boundary counts as Warning
        let now = email.received_at + Duration::hours(5);
        assert_eq!(compute_status(&email, now), SlaStatus::Warning);

        // Exactly at the SLA boundary counts as Breached
        let now = email.received_at + Duration::hours(6);
        assert_eq!(compute_status(&email, now), SlaStatus::Breached);
    }

    #[test]
    fn test_resolved_lock_in() {
        let mut email = make_email(SlaLabel::BugReport);
        email.resolved = true;
        email.resolved_at = Some(email.received_at + Duration::hours(1));

        for hours in [0, 1, 5, 100, 10_000] {
            let now = email.received_at + Duration::hours(hours);
            let progress = compute_progress(&email, now);
            assert_eq!(progress.status, SlaStatus::Resolved);
            assert_eq!(progress.time_remaining_text, "Resolved");
        }
    }

    #[test]
    fn test_resolved_freezes_elapsed() {
        let mut email = make_email(SlaLabel::Billing);
        email.resolved = true;
        email.resolved_at = Some(email.received_at + Duration::hours(2));

        let now = email.received_at + Duration::hours(50);
        let progress = compute_progress(&email, now);
        assert!((progress.elapsed_hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_billing_warning_scenario() {
        // Billing email at five and a half hours: past the 5h warning
        // threshold with half an hour left in the 6h window.
        let email = make_email(SlaLabel::Billing);
        let now = email.received_at + Duration::minutes(330);

        let progress = compute_progress(&email, now);
        assert_eq!(progress.status, SlaStatus::Warning);
        assert!((progress.elapsed_hours - 5.5).abs() < 1e-9);
        assert!((progress.remaining_hours - 0.5).abs() < 1e-9);
        assert_eq!(progress.time_remaining_text, "30m left");
    }

    #[test]
    fn test_bug_report_breach_clamps_fraction() {
        // Bug report at 2.1 hours: past the 2h window.
        let email = make_email(SlaLabel::BugReport);
        let now = email.received_at + Duration::minutes(126);

        let progress = compute_progress(&email, now);
        assert_eq!(progress.status, SlaStatus::Breached);
        assert_eq!(progress.time_remaining_text, "Breached");
        assert!((progress.fraction - 1.0).abs() < 1e-9);
        assert!((progress.remaining_hours - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_on_track_fraction_is_constant() {
        let email = make_email(SlaLabel::Billing);

        let early = compute_progress(&email, email.received_at + Duration::hours(1));
        let late = compute_progress(&email, email.received_at + Duration::hours(4));
        assert!((early.on_track_fraction - 5.0 / 6.0).abs() < 1e-9);
        assert_eq!(early.on_track_fraction, late.on_track_fraction);
    }

    #[test]
    fn test_format_time_remaining() {
        assert_eq!(format_time_remaining(0.0), "0h 0m left");
        assert_eq!(format_time_remaining(-1.5), "0h 0m left");
        assert_eq!(format_time_remaining(0.5), "30m left");
        assert_eq!(format_time_remaining(1.5), "1h 30m left");
        assert_eq!(format_time_remaining(2.25), "2h 15m left");
        assert_eq!(format_time_remaining(23.75), "23h 45m left");
    }
}
