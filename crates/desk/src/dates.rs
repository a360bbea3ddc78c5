//! Date helpers for dashboard display and range queries
//!
//! Pure functions; callers pass the reference time so formatting is
//! deterministic in tests.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Bounds of the current week: Monday 00:00:00 through Sunday 23:59:59.999
///
/// Sunday belongs to the week that started the previous Monday.
pub fn current_week_range(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let days_from_monday = now.weekday().num_days_from_monday() as i64;
    let monday_date = (now - Duration::days(days_from_monday)).date_naive();
    let sunday_date = monday_date + Duration::days(6);

    let start = Utc.from_utc_datetime(&monday_date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let end = Utc.from_utc_datetime(
        &sunday_date
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_default(),
    );

    (start, end)
}

/// Disjoint trailing windows for the recent-mail overview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentWindow {
    /// Since local midnight
    Today,
    /// The 7 trailing days, excluding today
    ThisWeek,
    /// Days 8 through 30 back
    ThisMonth,
}

impl RecentWindow {
    /// The (after, before) bounds of this window; `before` is open-ended
    /// for the most recent bucket
    pub fn bounds(self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        let today_start =
            Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default());
        let week_start = now - Duration::days(7);
        let month_start = now - Duration::days(30);

        match self {
            RecentWindow::Today => (today_start, None),
            RecentWindow::ThisWeek => (week_start, Some(today_start)),
            RecentWindow::ThisMonth => (month_start, Some(week_start)),
        }
    }
}

/// Format a date range compactly: "Jun 2 - 8, 2025", "Jun 28 - Jul 4, 2025"
/// or "Dec 28, 2024 - Jan 3, 2025" across a year boundary
pub fn format_date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.year() == end.year() {
        if start.month() == end.month() {
            return format!(
                "{} - {}, {}",
                start.format("%b %-d"),
                end.day(),
                end.year()
            );
        }
        return format!(
            "{} - {}, {}",
            start.format("%b %-d"),
            end.format("%b %-d"),
            end.year()
        );
    }

    format!("{} - {}", start.format("%b %-d, %Y"), end.format("%b %-d, %Y"))
}

/// Format a full timestamp: "Tue, Jun 3, 2025, 10:05 AM"
pub fn format_full_date(date: DateTime<Utc>) -> String {
    date.format("%a, %b %-d, %Y, %-I:%M %p").to_string()
}

/// Format a date relative to `now`: "Just now", "5m ago", "3h ago",
/// "2d ago", then a short date once it's a week old
pub fn format_relative_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - date;
    let mins = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if mins < 1 {
        return "Just now".to_string();
    }
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    if days < 7 {
        return format!("{}d ago", days);
    }

    date.format("%b %-d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_week_range_midweek() {
        // Wednesday June 4th 2025
        let (start, end) = current_week_range(at("2025-06-04T15:30:00Z"));
        assert_eq!(start.to_rfc3339(), "2025-06-02T00:00:00+00:00");
        assert_eq!(end.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-06-08 23:59:59");
    }

    #[test]
    fn test_week_range_on_monday() {
        let (start, _) = current_week_range(at("2025-06-02T00:30:00Z"));
        assert_eq!(start.to_rfc3339(), "2025-06-02T00:00:00+00:00");
    }

    #[test]
    fn test_week_range_sunday_belongs_to_previous_week() {
        // Sunday June 8th is still in the week of Monday June 2nd
        let (start, end) = current_week_range(at("2025-06-08T12:00:00Z"));
        assert_eq!(start.to_rfc3339(), "2025-06-02T00:00:00+00:00");
        assert_eq!(end.date_naive().to_string(), "2025-06-08");
    }

    #[test]
    fn test_recent_windows_are_disjoint() {
        let now = at("2025-06-04T15:30:00Z");
        let (today_after, today_before) = RecentWindow::Today.bounds(now);
        let (week_after, week_before) = RecentWindow::ThisWeek.bounds(now);
        let (month_after, month_before) = RecentWindow::ThisMonth.bounds(now);

        assert!(today_before.is_none());
        assert_eq!(week_before, Some(today_after));
        assert_eq!(month_before, Some(week_after));
        assert_eq!(month_after, now - Duration::days(30));
    }

    #[test]
    fn test_format_date_range_same_month() {
        let s = format_date_range(at("2025-06-02T00:00:00Z"), at("2025-06-08T23:59:59Z"));
        assert_eq!(s, "Jun 2 - 8, 2025");
    }

    #[test]
    fn test_format_date_range_cross_month() {
        let s = format_date_range(at("2025-06-28T00:00:00Z"), at("2025-07-04T23:59:59Z"));
        assert_eq!(s, "Jun 28 - Jul 4, 2025");
    }

    #[test]
    fn test_format_date_range_cross_year() {
        let s = format_date_range(at("2024-12-28T00:00:00Z"), at("2025-01-03T23:59:59Z"));
        assert_eq!(s, "Dec 28, 2024 - Jan 3, 2025");
    }

    #[test]
    fn test_format_relative_date() {
        let now = at("2025-06-04T12:00:00Z");
        assert_eq!(format_relative_date(at("2025-06-04T11:59:40Z"), now), "Just now");
        assert_eq!(format_relative_date(at("2025-06-04T11:55:00Z"), now), "5m ago");
        assert_eq!(format_relative_date(at("2025-06-04T09:00:00Z"), now), "3h ago");
        assert_eq!(format_relative_date(at("2025-06-02T12:00:00Z"), now), "2d ago");
        assert_eq!(format_relative_date(at("2025-05-20T12:00:00Z"), now), "May 20");
    }

    #[test]
    fn test_format_full_date() {
        assert_eq!(format_full_date(at("2025-06-03T10:05:00Z")), "Tue, Jun 3, 2025, 10:05 AM");
    }
}
