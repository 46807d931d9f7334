//! Email provider implementations.
//!
//! [`ProviderRegistry`] maps the `provider` discriminator found in a
//! credential secret to an [`EmailProvider`]. The registry is built once at
//! startup, so an unsupported identifier fails before any network call, and
//! new providers plug in without touching the reconcile driver.

mod mailersend;
mod mailgun;
mod mock;

pub use mailersend::MailerSendProvider;
pub use mailgun::MailgunProvider;
pub use mock::MockProvider;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::debug;

use crate::credentials::ResolvedCredentials;
use crate::error::DeliveryError;

/// One email ready for dispatch, fully resolved.
#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Normalized result of handing one email to a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendResult {
    /// Provider message identifier with any envelope characters stripped.
    /// May be empty when the provider reported none.
    pub message_id: String,
}

/// Trait for email sending providers.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one email. At most one attempt; no internal retries.
    async fn send(
        &self,
        credentials: &ResolvedCredentials,
        email: &OutboundEmail,
    ) -> Result<SendResult, DeliveryError>;

    /// Discriminator this provider registers under.
    fn name(&self) -> &'static str;

    /// Credential fields that must be present before a send is attempted.
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Registry of provider implementations keyed by discriminator.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn EmailProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every provider this build supports, sharing one HTTP
    /// client for connection reuse.
    pub fn standard() -> Self {
        let client = reqwest::Client::new();
        let mut registry = Self::new();
        registry.register(Arc::new(MailgunProvider::new(client.clone())));
        registry.register(Arc::new(MailerSendProvider::new(client)));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn EmailProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Sorted list of registered discriminators, for startup logging.
    pub fn supported(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Dispatch one email through the provider the credentials name.
    ///
    /// Fails with `UnsupportedProvider` or `MissingCredential` before any
    /// network call when the discriminator or a required field is absent.
    pub async fn dispatch(
        &self,
        credentials: &ResolvedCredentials,
        email: &OutboundEmail,
    ) -> Result<SendResult, DeliveryError> {
        let provider = self
            .providers
            .get(credentials.provider.as_str())
            .ok_or_else(|| DeliveryError::UnsupportedProvider(credentials.provider.clone()))?;

        for field in provider.required_fields() {
            if !credentials.has_field(field) {
                return Err(DeliveryError::MissingCredential {
                    provider: credentials.provider.clone(),
                    field,
                });
            }
        }

        debug!(
            provider = provider.name(),
            to = %email.recipient,
            "Dispatching email"
        );
        let started = Instant::now();
        let result = provider.send(credentials, email).await;

        let outcome = if result.is_ok() { "sent" } else { "error" };
        counter!("email_send_total", "provider" => provider.name(), "outcome" => outcome)
            .increment(1);
        histogram!("email_send_duration_seconds", "provider" => provider.name())
            .record(started.elapsed().as_secs_f64());

        result
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

    fn credentials(provider: &str, fields: &[(&str, &str)]) -> ResolvedCredentials {
        let mut data = SecretData::new();
        for (key, value) in fields {
            data.insert(*key, *value);
        }
        ResolvedCredentials::new(provider, data)
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_without_send() {
        let mock = Arc::new(MockProvider::named("mailgun"));
        let mut registry = ProviderRegistry::new();
        registry.register(mock.clone());

        let err = registry
            .dispatch(&credentials("sendgrid", &[]), &outbound())
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::UnsupportedProvider(_)));
        assert_eq!(err.to_string(), "invalid provider, sendgrid is not supported");
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_required_field_fails_without_send() {
        let mock = Arc::new(MockProvider::named("mailgun").requiring(&["domain", "token"]));
        let mut registry = ProviderRegistry::new();
        registry.register(mock.clone());

        let err = registry
            .dispatch(&credentials("mailgun", &[("token", "t")]), &outbound())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::MissingCredential { field: "domain", .. }
        ));
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_registered_provider() {
        let mock = Arc::new(MockProvider::named("mailgun").with_message_id("MSG123@d"));
        let mut registry = ProviderRegistry::new();
        registry.register(mock.clone());

        let result = registry
            .dispatch(&credentials("mailgun", &[]), &outbound())
            .await
            .unwrap();

        assert_eq!(result.message_id, "MSG123@d");
        assert_eq!(mock.sent_count().await, 1);
        assert_eq!(mock.sent().await[0].recipient, "a@b.com");
    }

    #[test]
    fn test_standard_registry_supports_both_providers() {
        let registry = ProviderRegistry::standard();
        assert_eq!(registry.supported(), vec!["mailgun", "mailsend"]);
    }
}
