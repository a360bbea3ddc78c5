//! Outbound automation webhook
//!
//! A single POST of the current stats plus user-entered label routing,
//! fired on explicit user action. Success is solely an HTTP 2xx status;
//! the response body carries no contract.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::models::GmailStats;

/// One label-to-address routing row included in the payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailField {
    pub label_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,
    pub email: String,
}

/// Payload POSTed to the webhook endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowPayload<'a> {
    user_email: &'a str,
    access_token: &'a str,
    timestamp: String,
    gmail_stats: &'a GmailStats,
    email_fields: &'a [EmailField],
}

/// Client for the automation webhook endpoint
pub struct WebhookClient {
    url: Option<String>,
}

impl WebhookClient {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// POST the payload, returning whether the endpoint answered 2xx.
    ///
    /// A missing URL is a configuration error; transport and HTTP
    /// failures are reported as `false`.
    pub fn trigger_workflow(
        &self,
        user_email: &str,
        access_token: &str,
        stats: &GmailStats,
        email_fields: &[EmailField],
    ) -> Result<bool> {
        let url = self.url.as_deref().context("Webhook URL not configured")?;

        let payload = WorkflowPayload {
            user_email,
            access_token,
            timestamp: Utc::now().to_rfc3339(),
            gmail_stats: stats,
            email_fields,
        };

        match ureq::post(url).send_json(&payload) {
            Ok(_) => {
                info!("Workflow triggered for {}", user_email);
                Ok(true)
            }
            Err(err) => {
                warn!("Failed to trigger workflow: {}", err);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_url_is_an_error() {
        let client = WebhookClient::new(None);
        assert!(!client.is_configured());

        let stats = GmailStats::default();
        let result = client.trigger_workflow("user@gmail.com", "token", &stats, &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let stats = GmailStats {
            total_inbox: 3,
            ..Default::default()
        };
        let fields = vec![EmailField {
            label_id: "1".to_string(),
            label_name: Some("1: Billing".to_string()),
            email: "ops@example.com".to_string(),
        }];
        let payload = WorkflowPayload {
            user_email: "user@gmail.com",
            access_token: "token",
            timestamp: "2025-06-01T12:00:00Z".to_string(),
            gmail_stats: &stats,
            email_fields: &fields,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"userEmail\":\"user@gmail.com\""));
        assert!(json.contains("\"gmailStats\""));
        assert!(json.contains("\"labelId\":\"1\""));
        assert!(json.contains("\"labelName\":\"1: Billing\""));
    }

    #[test]
    fn test_empty_label_name_is_omitted() {
        let field = EmailField {
            label_id: "2".to_string(),
            label_name: None,
            email: "bugs@example.com".to_string(),
        };
        let json = serde_json::to_string(&field).unwrap();
        assert!(!json.contains("labelName"));
    }
}
