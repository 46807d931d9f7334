//! MailerSend email provider, registered under the `mailsend` discriminator.
//!
//! Sends through the MailerSend v1 email API (JSON POST, bearer auth). The
//! same content goes out as both the plain-text and HTML bodies, and display
//! names stay empty; only addresses are populated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::debug;

use super::{EmailProvider, OutboundEmail, SendResult};
use crate::credentials::ResolvedCredentials;
use crate::error::DeliveryError;

const MAILERSEND_API_BASE: &str = "https://api.mailersend.com";

/// Request-scoped bound on the whole send.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Response header carrying the accepted message's identifier.
const MESSAGE_ID_HEADER: &str = "X-Message-Id";

/// MailerSend provider.
pub struct MailerSendProvider {
    client: Client,
    base_url: String,
}

impl MailerSendProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: MAILERSEND_API_BASE.to_string(),
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

#[derive(Debug, Serialize)]
struct Party<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: Party<'a>,
    to: Vec<Party<'a>>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[async_trait]
impl EmailProvider for MailerSendProvider {
    async fn send(
        &self,
        credentials: &ResolvedCredentials,
        email: &OutboundEmail,
    ) -> Result<SendResult, DeliveryError> {
        let token = credentials.require("token")?;

        let request = SendRequest {
            from: Party {
                email: &email.sender,
                name: "",
            },
            to: vec![Party {
                email: &email.recipient,
                name: "",
            }],
            subject: &email.subject,
            text: &email.body,
            html: &email.body,
        };

        let response = self
            .client
            .post(format!("{}/v1/email", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeliveryError::Dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Dispatch(if body.is_empty() {
                format!("mailersend returned {status}")
            } else {
                body
            }));
        }

        // The API reports the identifier in a response header; an absent
        // header normalizes to an empty id rather than a failure.
        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        debug!(message_id = %message_id, "MailerSend accepted message");
        Ok(SendResult { message_id })
    }

    fn name(&self) -> &'static str {
        "mailsend"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["token"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SecretData;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> ResolvedCredentials {
        let mut data = SecretData::new();
        data.insert("provider", "mailsend");
        data.insert("token", "t");
        ResolvedCredentials::new("mailsend", data)
    }

    fn outbound() -> OutboundEmail {
        OutboundEmail {
            sender: "noreply@example.com".to_string(),
            recipient: "a@b.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_message_id_comes_from_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email"))
            .and(header("Authorization", "Bearer t"))
            .respond_with(
                ResponseTemplate::new(202).insert_header("X-Message-Id", "5e9c6faa"),
            )
            .mount(&server)
            .await;

        let provider = MailerSendProvider::with_base_url(Client::new(), server.uri());
        let result = provider.send(&credentials(), &outbound()).await.unwrap();

        assert_eq!(result.message_id, "5e9c6faa");
    }

    #[tokio::test]
    async fn test_missing_header_normalizes_to_empty_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let provider = MailerSendProvider::with_base_url(Client::new(), server.uri());
        let result = provider.send(&credentials(), &outbound()).await.unwrap();

        assert_eq!(result.message_id, "");
    }

    #[tokio::test]
    async fn test_body_is_sent_as_text_and_html() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email"))
            .and(body_string_contains(r#""text":"hello""#))
            .and(body_string_contains(r#""html":"hello""#))
            .and(body_string_contains(r#""name":"""#))
            .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "id-1"))
            .mount(&server)
            .await;

        let provider = MailerSendProvider::with_base_url(Client::new(), server.uri());
        let result = provider.send(&credentials(), &outbound()).await.unwrap();

        assert_eq!(result.message_id, "id-1");
    }

    #[tokio::test]
    async fn test_send_failure_carries_provider_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string(r#"{"message":"The from.email must be verified."}"#),
            )
            .mount(&server)
            .await;

        let provider = MailerSendProvider::with_base_url(Client::new(), server.uri());
        let err = provider.send(&credentials(), &outbound()).await.unwrap_err();

        assert!(err.to_string().contains("must be verified"));
    }
}
