//! Gmail API response normalization
//!
//! Converts Gmail API responses to Argus domain models.

use chrono::{DateTime, TimeZone, Utc};

use super::api::{GmailLabel, GmailMessage, MessagePayload};
use crate::dates::format_relative_date;
use crate::models::{CachedMessage, EmailAddress, Label, MessageId};

/// Maximum preview length stored on SLA rows
const PREVIEW_MAX_CHARS: usize = 100;

/// Normalize a Gmail API message to a cached summary
///
/// `now` anchors the relative display date so callers can format
/// deterministically in tests.
pub fn normalize_summary(gmail_msg: &GmailMessage, now: DateTime<Utc>) -> CachedMessage {
    let id = MessageId::new(&gmail_msg.id);
    let label_ids = gmail_msg.label_ids.clone().unwrap_or_default();

    let from = gmail_msg
        .payload
        .as_ref()
        .and_then(|p| extract_header(p, "From"))
        .map(|s| EmailAddress::parse(&s))
        .unwrap_or_else(|| EmailAddress::new("Unknown"));

    let subject = gmail_msg
        .payload
        .as_ref()
        .and_then(|p| extract_header(p, "Subject"))
        .unwrap_or_else(|| "(No subject)".to_string());

    let received_at = parse_received_at(gmail_msg);

    // Fall back to the raw Date header when it exists but didn't parse
    let display_date = match received_at {
        Some(date) => format_relative_date(date, now),
        None => gmail_msg
            .payload
            .as_ref()
            .and_then(|p| extract_header(p, "Date"))
            .unwrap_or_default(),
    };

    let has_attachments = gmail_msg
        .payload
        .as_ref()
        .is_some_and(payload_has_attachments);

    let is_read = !label_ids.iter().any(|l| l == "UNREAD");
    let is_starred = label_ids.iter().any(|l| l == "STARRED");

    let mut builder = CachedMessage::builder(id, gmail_msg.thread_id.clone())
        .snippet(decode_html_entities(&gmail_msg.snippet))
        .from(from)
        .subject(subject)
        .display_date(display_date)
        .is_read(is_read)
        .has_attachments(has_attachments)
        .label_ids(label_ids)
        .is_starred(is_starred)
        .cached_at(now);

    if let Some(received_at) = received_at {
        builder = builder.received_at(received_at);
    }

    builder.build()
}

/// Parse when a message was received
///
/// Prefers the Date header (RFC 2822); falls back to the provider's
/// internal timestamp (epoch milliseconds). None when neither parses.
pub fn parse_received_at(gmail_msg: &GmailMessage) -> Option<DateTime<Utc>> {
    if let Some(payload) = &gmail_msg.payload
        && let Some(header) = extract_header(payload, "Date")
        && let Ok(parsed) = DateTime::parse_from_rfc2822(header.trim())
    {
        return Some(parsed.with_timezone(&Utc));
    }

    let millis: i64 = gmail_msg.internal_date.as_deref()?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Normalize a Gmail label to the domain model
pub fn normalize_label(label: GmailLabel) -> Label {
    Label {
        id: label.id.into(),
        name: label.name,
        is_system: label.label_type.as_deref() == Some("system"),
        messages_total: label.messages_total,
        messages_unread: label.messages_unread,
    }
}

/// Truncate a snippet to the preview length, appending "..." when cut
pub fn truncate_preview(snippet: &str) -> String {
    let mut chars = snippet.chars();
    let head: String = chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Extract a header value by name
pub(crate) fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Whether any part of the payload carries a filename
fn payload_has_attachments(payload: &MessagePayload) -> bool {
    payload.parts.as_ref().is_some_and(|parts| {
        parts
            .iter()
            .any(|p| p.filename.as_ref().is_some_and(|f| !f.is_empty()))
    })
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{Header, MessageBody, MessagePart};

    fn make_test_payload(headers: Vec<(&str, &str)>) -> MessagePayload {
        MessagePayload {
            headers: Some(
                headers
                    .into_iter()
                    .map(|(n, v)| Header {
                        name: n.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            ),
            body: Some(MessageBody {
                size: Some(0),
                data: None,
                attachment_id: None,
            }),
            parts: None,
            mime_type: Some("text/plain".to_string()),
        }
    }

    fn make_test_message(headers: Vec<(&str, &str)>, internal_date: Option<&str>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            label_ids: Some(vec!["INBOX".to_string(), "UNREAD".to_string()]),
            snippet: "A short preview".to_string(),
            internal_date: internal_date.map(|s| s.to_string()),
            payload: Some(make_test_payload(headers)),
        }
    }

    #[test]
    fn test_extract_header() {
        let payload = make_test_payload(vec![
            ("From", "test@example.com"),
            ("Subject", "Test Subject"),
        ]);

        assert_eq!(
            extract_header(&payload, "From"),
            Some("test@example.com".to_string())
        );
        assert_eq!(
            extract_header(&payload, "Subject"),
            Some("Test Subject".to_string())
        );
        assert_eq!(extract_header(&payload, "Cc"), None);
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let payload = make_test_payload(vec![("FROM", "test@example.com")]);
        assert_eq!(
            extract_header(&payload, "from"),
            Some("test@example.com".to_string())
        );
    }

    #[test]
    fn test_received_at_prefers_date_header() {
        let msg = make_test_message(
            vec![("Date", "Tue, 3 Jun 2025 10:00:00 +0000")],
            Some("1748080800000"),
        );
        let received = parse_received_at(&msg).unwrap();
        assert_eq!(received.to_rfc3339(), "2025-06-03T10:00:00+00:00");
    }

    #[test]
    fn test_received_at_falls_back_to_internal_date() {
        let msg = make_test_message(vec![("Date", "not a date")], Some("1700000000000"));
        let received = parse_received_at(&msg).unwrap();
        assert_eq!(received.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn test_received_at_none_when_unparsable() {
        let msg = make_test_message(vec![("Date", "not a date")], None);
        assert!(parse_received_at(&msg).is_none());
    }

    #[test]
    fn test_normalize_summary_flags() {
        let now = Utc::now();
        let mut msg = make_test_message(
            vec![
                ("From", "Support <support@example.com>"),
                ("Date", "Tue, 3 Jun 2025 10:00:00 +0000"),
            ],
            None,
        );
        msg.label_ids = Some(vec!["INBOX".to_string(), "STARRED".to_string()]);

        let summary = normalize_summary(&msg, now);
        assert_eq!(summary.from.email, "support@example.com");
        assert_eq!(summary.subject, "(No subject)");
        assert!(summary.is_read);
        assert!(summary.is_starred);
        assert!(!summary.has_attachments);
    }

    #[test]
    fn test_normalize_summary_attachments() {
        let now = Utc::now();
        let mut msg = make_test_message(vec![], None);
        if let Some(payload) = &mut msg.payload {
            payload.parts = Some(vec![MessagePart {
                part_id: None,
                mime_type: Some("application/pdf".to_string()),
                filename: Some("invoice.pdf".to_string()),
                headers: None,
                body: None,
                parts: None,
            }]);
        }

        let summary = normalize_summary(&msg, now);
        assert!(summary.has_attachments);
    }

    #[test]
    fn test_truncate_preview_short() {
        assert_eq!(truncate_preview("short"), "short");
    }

    #[test]
    fn test_truncate_preview_long() {
        let long = "x".repeat(150);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_truncate_preview_exact_boundary() {
        let exact = "y".repeat(100);
        assert_eq!(truncate_preview(&exact), exact);
    }

    #[test]
    fn test_decode_html_entities() {
        let input = "Hello &amp; welcome &lt;user&gt;";
        let output = decode_html_entities(input);
        assert_eq!(output, "Hello & welcome <user>");
    }

    #[test]
    fn test_normalize_label() {
        let label = normalize_label(GmailLabel {
            id: "Label_3".to_string(),
            name: "3: feature request".to_string(),
            label_type: Some("user".to_string()),
            messages_total: Some(40),
            messages_unread: Some(2),
            threads_total: None,
            threads_unread: None,
        });
        assert!(label.is_user());
        assert_eq!(label.messages_total, Some(40));
    }
}
