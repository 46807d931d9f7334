//! Credential resolution.
//!
//! Maps a sender config to the provider discriminator and credential fields
//! held in its referenced secret. Pure read; the resolver performs no side
//! effects and never logs credential values.

use kube::ResourceExt;
use secrecy::SecretString;

use crate::cluster::{ResourceAccess, ResourceKey, SecretData};
use crate::crd::EmailSenderConfig;
use crate::error::DeliveryError;

/// The key every credential secret must carry to pick a provider.
pub const PROVIDER_KEY: &str = "provider";

/// Namespace the secret lookup falls back to when the sender config carries
/// none. Applies to the secret lookup only, never to the config's identity.
const DEFAULT_NAMESPACE: &str = "default";

/// Provider discriminator plus the opaque credential fields backing it.
#[derive(Debug)]
pub struct ResolvedCredentials {
    pub provider: String,
    secret: SecretData,
}

impl ResolvedCredentials {
    pub fn new(provider: impl Into<String>, secret: SecretData) -> Self {
        Self {
            provider: provider.into(),
            secret,
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.secret.contains(field)
    }

    /// Credential field wrapped so accidental Debug/log output stays clean.
    pub fn field(&self, field: &str) -> Option<SecretString> {
        self.secret.utf8(field).map(SecretString::new)
    }

    /// Like [`Self::field`] but failing with a named error.
    pub fn require(&self, field: &'static str) -> Result<SecretString, DeliveryError> {
        self.field(field)
            .ok_or_else(|| DeliveryError::MissingCredential {
                provider: self.provider.clone(),
                field,
            })
    }
}

/// Resolve the secret referenced by `config` into provider + credentials.
pub async fn resolve<C>(
    cluster: &C,
    config: &EmailSenderConfig,
) -> Result<ResolvedCredentials, DeliveryError>
where
    C: ResourceAccess + ?Sized,
{
    let namespace = config
        .namespace()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let key = ResourceKey::new(namespace, config.spec.api_token_secret_ref.clone());
    let config_ref = config.name_any();

    let secret = cluster
        .get_secret(&key)
        .await?
        .ok_or_else(|| DeliveryError::SecretNotFound {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            config_ref: config_ref.clone(),
        })?;

    let provider = secret
        .utf8(PROVIDER_KEY)
        .ok_or(DeliveryError::MissingProviderKey(config_ref))?;

    Ok(ResolvedCredentials::new(provider, secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::InMemoryCluster;
    use crate::crd::EmailSenderConfigSpec;
    use secrecy::ExposeSecret;

    fn sender_config(namespace: Option<&str>) -> EmailSenderConfig {
        let mut config = EmailSenderConfig::new(
            "prod-sender",
            EmailSenderConfigSpec {
                sender_email: "noreply@example.com".to_string(),
                api_token_secret_ref: "mail-creds".to_string(),
            },
        );
        config.metadata.namespace = namespace.map(str::to_string);
        config
    }

    fn mailgun_secret() -> SecretData {
        let mut data = SecretData::new();
        data.insert("provider", "mailgun");
        data.insert("domain", "d");
        data.insert("token", "t");
        data
    }

    #[tokio::test]
    async fn test_resolves_provider_and_fields() {
        let cluster = InMemoryCluster::new();
        cluster
            .put_secret(ResourceKey::new("mail", "mail-creds"), mailgun_secret())
            .await;

        let credentials = resolve(&cluster, &sender_config(Some("mail"))).await.unwrap();
        assert_eq!(credentials.provider, "mailgun");
        assert_eq!(credentials.require("domain").unwrap().expose_secret(), "d");
        assert!(credentials.has_field("token"));
    }

    #[tokio::test]
    async fn test_secret_lookup_defaults_to_default_namespace() {
        let cluster = InMemoryCluster::new();
        cluster
            .put_secret(ResourceKey::new("default", "mail-creds"), mailgun_secret())
            .await;

        let credentials = resolve(&cluster, &sender_config(None)).await.unwrap();
        assert_eq!(credentials.provider, "mailgun");
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let cluster = InMemoryCluster::new();

        let err = resolve(&cluster, &sender_config(Some("mail")))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::SecretNotFound { .. }));
        assert!(err.to_string().contains("prod-sender"));
    }

    #[tokio::test]
    async fn test_missing_provider_key_names_config() {
        let cluster = InMemoryCluster::new();
        let mut data = SecretData::new();
        data.insert("token", "t");
        cluster
            .put_secret(ResourceKey::new("mail", "mail-creds"), data)
            .await;

        let err = resolve(&cluster, &sender_config(Some("mail")))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::MissingProviderKey(_)));
        assert!(err.to_string().contains("prod-sender"));
    }

    #[tokio::test]
    async fn test_require_names_the_missing_field() {
        let mut data = SecretData::new();
        data.insert("provider", "mailgun");
        let credentials = ResolvedCredentials::new("mailgun", data);

        let err = credentials.require("domain").unwrap_err();
        assert!(err.to_string().contains("domain"));
        assert!(err.to_string().contains("mailgun"));
    }
}
