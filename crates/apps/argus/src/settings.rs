//! Daemon settings file
//!
//! Optional JSON file at ~/.config/argus/settings.json. Every field has a
//! default so a missing file means a daemon with no webhook and no push
//! channel, which is a valid configuration.

use desk::EmailField;
use log::warn;
use serde::Deserialize;

const SETTINGS_FILE: &str = "settings.json";

/// One label-to-address routing row for the workflow webhook
#[derive(Debug, Clone, Deserialize)]
pub struct EmailFieldSetting {
    pub label_id: String,
    #[serde(default)]
    pub label_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Automation webhook endpoint; absent disables the webhook trigger
    pub webhook_url: Option<String>,
    /// Pub/Sub topic for the Gmail watch channel; absent disables watch
    pub pubsub_topic: Option<String>,
    /// Label routing rows included in the webhook payload
    pub email_fields: Vec<EmailFieldSetting>,
}

impl DaemonSettings {
    /// Load settings, falling back to defaults when the file is missing.
    ///
    /// A present-but-broken file is reported and treated as missing; the
    /// daemon must come up either way.
    pub fn load() -> Self {
        if !config::config_exists(SETTINGS_FILE) {
            return Self::default();
        }
        match config::load_json(SETTINGS_FILE) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Ignoring unreadable settings file: {:#}", err);
                Self::default()
            }
        }
    }

    /// Webhook payload rows for the configured routing table.
    pub fn email_fields(&self) -> Vec<EmailField> {
        self.email_fields
            .iter()
            .map(|field| EmailField {
                label_id: field.label_id.clone(),
                label_name: field.label_name.clone(),
                email: field.email.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let settings: DaemonSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.webhook_url.is_none());
        assert!(settings.pubsub_topic.is_none());
        assert!(settings.email_fields.is_empty());
    }

    #[test]
    fn test_parse_full_settings() {
        let json = r#"{
            "webhook_url": "https://hooks.example.com/argus",
            "pubsub_topic": "projects/demo/topics/gmail",
            "email_fields": [
                { "label_id": "Label_7", "label_name": "1: billing", "email": "ops@example.com" },
                { "label_id": "Label_8", "email": "bugs@example.com" }
            ]
        }"#;

        let settings: DaemonSettings = serde_json::from_str(json).unwrap();
        assert_eq!(
            settings.webhook_url.as_deref(),
            Some("https://hooks.example.com/argus")
        );

        let fields = settings.email_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].label_name.as_deref(), Some("1: billing"));
        assert!(fields[1].label_name.is_none());
    }
}
