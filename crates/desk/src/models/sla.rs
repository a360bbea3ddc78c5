//! SLA tracking models for labeled support mail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// The closed set of support labels that carry an SLA window
///
/// Label names are matched against the user's Gmail labels exactly,
/// case-sensitively. The hour table is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlaLabel {
    Billing,
    BugReport,
    FeatureRequest,
    AbuseReport,
}

impl SlaLabel {
    /// All SLA labels in priority order
    pub const ALL: [SlaLabel; 4] = [
        SlaLabel::Billing,
        SlaLabel::BugReport,
        SlaLabel::FeatureRequest,
        SlaLabel::AbuseReport,
    ];

    /// The Gmail label name this SLA is attached to
    pub fn name(&self) -> &'static str {
        match self {
            SlaLabel::Billing => "1: billing",
            SlaLabel::BugReport => "2: bug report",
            SlaLabel::FeatureRequest => "3: feature request",
            SlaLabel::AbuseReport => "4: abuse report",
        }
    }

    /// Resolve an exact label name back to its SLA label
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.name() == name)
    }

    /// Hours after receipt within which the email must be resolved
    pub fn sla_hours(&self) -> f64 {
        match self {
            SlaLabel::Billing => 6.0,
            SlaLabel::BugReport => 2.0,
            SlaLabel::FeatureRequest => 24.0,
            SlaLabel::AbuseReport => 3.0,
        }
    }

    /// Hours after receipt at which the email stops being "on track"
    ///
    /// Always strictly less than `sla_hours`.
    pub fn on_track_hours(&self) -> f64 {
        match self {
            SlaLabel::Billing => 5.0,
            SlaLabel::BugReport => 1.5,
            SlaLabel::FeatureRequest => 22.0,
            SlaLabel::AbuseReport => 2.5,
        }
    }
}

/// A tracked support email, one row per (user, message)
///
/// Created by the SLA sync engine on first sighting. Only explicit user
/// actions mutate it afterwards (resolve or delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaEmail {
    pub user_email: String,
    pub message_id: MessageId,
    /// Sender address extracted from the From header
    pub email_address: String,
    pub subject: String,
    /// Snippet truncated to 100 characters
    pub body_preview: String,
    pub label: SlaLabel,
    pub received_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaEmail {
    pub fn new(
        user_email: impl Into<String>,
        message_id: MessageId,
        email_address: impl Into<String>,
        subject: impl Into<String>,
        body_preview: impl Into<String>,
        label: SlaLabel,
        received_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_email: user_email.into(),
            message_id,
            email_address: email_address.into(),
            subject: subject.into(),
            body_preview: body_preview.into(),
            label,
            received_at,
            resolved: false,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Where an unresolved email sits relative to its SLA window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaStatus {
    OnTrack,
    Warning,
    Breached,
    Resolved,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::OnTrack => "On Track",
            SlaStatus::Warning => "Warning",
            SlaStatus::Breached => "Breached",
            SlaStatus::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived progress for one tracked email at a reference time
#[derive(Debug, Clone, PartialEq)]
pub struct SlaProgress {
    pub status: SlaStatus,
    /// Hours from receipt to resolution (or to the reference time)
    pub elapsed_hours: f64,
    /// Hours left in the window, floored at zero
    pub remaining_hours: f64,
    /// Elapsed share of the window, clamped to 1.0
    pub fraction: f64,
    /// Share of the window at which the warning threshold sits
    pub on_track_fraction: f64,
    /// Countdown text ("1h 30m left", "Breached", "Resolved")
    pub time_remaining_text: String,
}
