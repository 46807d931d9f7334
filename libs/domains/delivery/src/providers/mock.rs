//! Mock provider for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailProvider, OutboundEmail, SendResult};
use crate::credentials::ResolvedCredentials;
use crate::error::DeliveryError;

/// Capturing provider that scripts its outcome.
///
/// Registers under any `'static` discriminator so tests can stand in for a
/// real provider without network access.
pub struct MockProvider {
    name: &'static str,
    required_fields: &'static [&'static str],
    message_id: String,
    failure: Option<String>,
    delay: Option<Duration>,
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            required_fields: &[],
            message_id: "mock-id".to_string(),
            failure: None,
            delay: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that fails every send with `message`.
    pub fn failing(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::named(name)
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn requiring(mut self, fields: &'static [&'static str]) -> Self {
        self.required_fields = fields;
        self
    }

    /// Sleep this long inside every send, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All emails handed to this provider so far.
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(
        &self,
        _credentials: &ResolvedCredentials,
        email: &OutboundEmail,
    ) -> Result<SendResult, DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(DeliveryError::Dispatch(message.clone()));
        }

        self.sent.lock().await.push(email.clone());
        Ok(SendResult {
            message_id: self.message_id.clone(),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn required_fields(&self) -> &'static [&'static str] {
        self.required_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SecretData;

    fn outbound() -> OutboundEmail {
        OutboundEmail {
            sender: "noreply@example.com".to_string(),
            recipient: "a@b.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_captures_sends() {
        let provider = MockProvider::named("mailgun").with_message_id("MSG123@d");
        let credentials = ResolvedCredentials::new("mailgun", SecretData::new());

        let result = provider.send(&credentials, &outbound()).await.unwrap();
        assert_eq!(result.message_id, "MSG123@d");
        assert_eq!(provider.sent_count().await, 1);
        assert_eq!(provider.sent().await[0].subject, "hi");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let provider = MockProvider::failing("mailgun", "simulated outage");
        let credentials = ResolvedCredentials::new("mailgun", SecretData::new());

        let err = provider.send(&credentials, &outbound()).await.unwrap_err();
        assert_eq!(err.to_string(), "simulated outage");
        assert_eq!(provider.sent_count().await, 0);
    }
}
