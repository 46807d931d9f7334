//! Mailgun email provider.
//!
//! Sends through the Mailgun messages API (form-encoded POST, basic auth
//! `api:{token}` against the configured sending domain).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use super::{EmailProvider, OutboundEmail, SendResult};
use crate::credentials::ResolvedCredentials;
use crate::error::DeliveryError;

const MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

/// Bounds the whole send, connect included. Request-scoped, so cancelling
/// the reconciliation aborts the call too.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Mailgun provider, registered under `mailgun`.
pub struct MailgunProvider {
    client: Client,
    base_url: String,
}

impl MailgunProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: MAILGUN_API_BASE.to_string(),
        }
    }

    /// Point the provider at a different API root (tests).
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    #[serde(default)]
    id: String,
}

/// Mailgun wraps message IDs in angle brackets (`<id>`); drop exactly one
/// leading `<` and one trailing `>`, nothing more.
fn strip_envelope(id: &str) -> String {
    let id = id.strip_prefix('<').unwrap_or(id);
    let id = id.strip_suffix('>').unwrap_or(id);
    id.to_string()
}

#[async_trait]
impl EmailProvider for MailgunProvider {
    async fn send(
        &self,
        credentials: &ResolvedCredentials,
        email: &OutboundEmail,
    ) -> Result<SendResult, DeliveryError> {
        let domain = credentials.require("domain")?;
        let token = credentials.require("token")?;

        let url = format!("{}/{}/messages", self.base_url, domain.expose_secret());
        let params = [
            ("from", email.sender.as_str()),
            ("to", email.recipient.as_str()),
            ("subject", email.subject.as_str()),
            ("text", email.body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(token.expose_secret()))
            .form(&params)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeliveryError::Dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Dispatch(if body.is_empty() {
                format!("mailgun returned {status}")
            } else {
                body
            }));
        }

        let parsed: MailgunResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Dispatch(e.to_string()))?;
        let message_id = strip_envelope(&parsed.id);

        debug!(message_id = %message_id, "Mailgun accepted message");
        Ok(SendResult { message_id })
    }

    fn name(&self) -> &'static str {
        "mailgun"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["domain", "token"]
    }
}
