//! Gmail OAuth2 authentication
//!
//! Authorization-code flow with a loopback redirect: a short-lived TCP
//! listener on localhost receives the callback while the user consents in
//! a browser. Tokens persist under the config directory so later runs
//! refresh silently. Synchronous HTTP (ureq) keeps this executor-agnostic.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use url::Url;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes the dashboard needs: modify covers read plus label changes and
/// trash, send covers outgoing mail
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
];

/// Loopback ports tried for the OAuth callback listener
const PORT_RANGE: std::ops::RangeInclusive<u16> = 8080..=8090;

/// Tokens this close to expiry are refreshed rather than used
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Token file written under the config directory
#[derive(Debug, Serialize, Deserialize)]
struct TokenCache {
    access_token: String,
    refresh_token: Option<String>,
    /// Epoch seconds; None means unknown lifetime, treated as expired
    expires_at: Option<i64>,
}

impl TokenCache {
    fn usable(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at > Utc::now().timestamp() + EXPIRY_BUFFER_SECS)
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl GmailAuth {
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path = config::config_path("gmail-tokens.json")
            .context("Could not determine config directory")?;

        Ok(Self {
            client_id,
            client_secret,
            token_path,
        })
    }

    /// Get a valid access token, refreshing or re-authenticating as needed.
    pub fn get_access_token(&self) -> Result<String> {
        if let Ok(cached) = self.load_cache() {
            if cached.usable() {
                return Ok(cached.access_token);
            }

            if let Some(refresh_token) = cached.refresh_token {
                match self.refresh(&refresh_token) {
                    Ok(fresh) => {
                        self.store(&fresh)?;
                        return Ok(fresh.access_token);
                    }
                    // A revoked grant falls through to a new consent flow
                    Err(err) => warn!("Token refresh failed: {:#}", err),
                }
            }
        }

        let fresh = self.consent_flow()?;
        self.store(&fresh)?;
        Ok(fresh.access_token)
    }

    /// Whether a stored token is usable without user interaction.
    pub fn is_authenticated(&self) -> bool {
        let Ok(cached) = self.load_cache() else {
            return false;
        };
        if cached.usable() {
            return true;
        }
        cached
            .refresh_token
            .is_some_and(|token| self.refresh(&token).is_ok())
    }

    /// Clear stored tokens (logout).
    pub fn logout(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)?;
        }
        Ok(())
    }

    /// Run the full browser consent flow and exchange the code for tokens.
    fn consent_flow(&self) -> Result<TokenResponse> {
        let (listener, port) = bind_loopback()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let scope = SCOPES.join(" ");
        let auth_url = Url::parse_with_params(
            AUTH_URL,
            [
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .context("Failed to build authorization URL")?;

        println!("\n=== Gmail Authentication Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(auth_url.as_str()) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = wait_for_callback(listener)?;

        let mut response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let tokens: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Authentication successful!\n");
        Ok(tokens)
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut tokens: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh; keep the old one
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }

        Ok(tokens)
    }

    fn load_cache(&self) -> Result<TokenCache> {
        let content = fs::read_to_string(&self.token_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, tokens: &TokenResponse) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let cache = TokenCache {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs as i64),
        };

        fs::write(&self.token_path, serde_json::to_string_pretty(&cache)?)?;
        Ok(())
    }
}

/// Bind the callback listener to the first free loopback port.
fn bind_loopback() -> Result<(TcpListener, u16)> {
    for port in PORT_RANGE {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok((listener, port));
        }
    }
    bail!(
        "Could not bind to any port in range {}-{}",
        PORT_RANGE.start(),
        PORT_RANGE.end()
    )
}

/// Accept one callback connection and extract the authorization code.
fn wait_for_callback(listener: TcpListener) -> Result<String> {
    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("Failed to read request")?;

    let result = parse_callback(&request_line);

    let (status, body) = match &result {
        Ok(_) => (
            "200 OK",
            "Argus is now connected to Gmail. You can close this window.",
        ),
        Err(_) => ("400 Bad Request", "Authentication failed. Please try again."),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();

    result
}

/// Pull the `code` parameter out of the callback request line.
///
/// The request looks like `GET /?code=...&scope=... HTTP/1.1`; Google
/// reports refusal with an `error` parameter instead of a code.
fn parse_callback(request_line: &str) -> Result<String> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let url = Url::parse(&format!("http://localhost{}", path))
        .context("Malformed callback path")?;

    if let Some((_, error)) = url.query_pairs().find(|(key, _)| key == "error") {
        bail!("OAuth error: {}", error);
    }

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, code)| code.into_owned())
        .context("No authorization code received")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_extracts_code() {
        let line = "GET /?code=4%2FabcDEF&scope=gmail.modify HTTP/1.1";
        assert_eq!(parse_callback(line).unwrap(), "4/abcDEF");
    }

    #[test]
    fn test_parse_callback_reports_denial() {
        let line = "GET /?error=access_denied HTTP/1.1";
        let err = parse_callback(line).unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_without_code() {
        assert!(parse_callback("GET / HTTP/1.1").is_err());
        assert!(parse_callback("").is_err());
    }

    #[test]
    fn test_token_cache_expiry_buffer() {
        let fresh = TokenCache {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 3600),
        };
        assert!(fresh.usable());

        let stale = TokenCache {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 60),
        };
        assert!(!stale.usable());

        let unknown = TokenCache {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!unknown.usable());
    }
}
