//! Per-user UI preferences

use serde::{Deserialize, Serialize};

/// Persisted dashboard preferences for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPreferences {
    pub user_email: String,
    pub sidebar_width: i64,
    pub sidebar_open: bool,
    pub selected_folder: String,
    pub load_external_images: bool,
}

impl EmailPreferences {
    /// Defaults for a user with no stored preferences
    pub fn defaults(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            sidebar_width: 280,
            sidebar_open: true,
            selected_folder: "INBOX".to_string(),
            load_external_images: false,
        }
    }
}

/// A partial preferences update; None fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub sidebar_width: Option<i64>,
    pub sidebar_open: Option<bool>,
    pub selected_folder: Option<String>,
    pub load_external_images: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = EmailPreferences::defaults("user@gmail.com");
        assert_eq!(prefs.selected_folder, "INBOX");
        assert!(prefs.sidebar_open);
        assert!(!prefs.load_external_images);
    }
}
