//! MIME assembly for outgoing mail
//!
//! Gmail's send endpoint takes a full RFC 2822 message, base64url-encoded
//! without padding. Messages are built as multipart/alternative with a
//! plain part and an HTML part derived from the same body.

use base64::prelude::*;
use chrono::Utc;

/// An outgoing email composition
#[derive(Debug, Clone, Default)]
pub struct OutgoingMail {
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    /// Plain-text body; the HTML part is derived from it
    pub body: String,
    /// Thread to attach the message to when replying
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

/// Build the base64url-encoded raw message for the send endpoint
pub fn build_raw_message(mail: &OutgoingMail) -> String {
    let boundary = format!("----=_Part_{}", Utc::now().timestamp_millis());
    let mime = build_mime_message(mail, &boundary);
    BASE64_URL_SAFE_NO_PAD.encode(mime.as_bytes())
}

/// Assemble the RFC 2822 message text with the given part boundary
fn build_mime_message(mail: &OutgoingMail, boundary: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("To: {}", mail.to));
    if let Some(cc) = &mail.cc {
        lines.push(format!("Cc: {}", cc));
    }
    if let Some(bcc) = &mail.bcc {
        lines.push(format!("Bcc: {}", bcc));
    }
    lines.push(format!("Subject: {}", mail.subject));
    lines.push("MIME-Version: 1.0".to_string());
    lines.push(format!(
        "Content-Type: multipart/alternative; boundary=\"{}\"",
        boundary
    ));
    if let Some(in_reply_to) = &mail.in_reply_to {
        lines.push(format!("In-Reply-To: {}", in_reply_to));
    }
    if let Some(references) = &mail.references {
        lines.push(format!("References: {}", references));
    }
    lines.push(String::new());
    lines.push(format!("--{}", boundary));
    lines.push("Content-Type: text/plain; charset=\"UTF-8\"".to_string());
    lines.push(String::new());
    lines.push(mail.body.clone());
    lines.push(String::new());
    lines.push(format!("--{}", boundary));
    lines.push("Content-Type: text/html; charset=\"UTF-8\"".to_string());
    lines.push(String::new());
    lines.push(mail.body.replace('\n', "<br>"));
    lines.push(String::new());
    lines.push(format!("--{}--", boundary));

    lines.join("\r\n")
}
