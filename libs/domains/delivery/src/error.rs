//! Error types for the delivery domain.

use thiserror::Error;

use crate::cluster::ClusterError;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors that can occur while reconciling an `Email`.
///
/// Everything except `SenderConfigNotFound` surfaces as a persisted `Error`
/// status on the resource; `SenderConfigNotFound` leaves the status alone
/// and only emits a `Validation` event.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The referenced `EmailSenderConfig` could not be fetched.
    #[error("can't find EmailSenderConfig {0}")]
    SenderConfigNotFound(String),

    /// The secret named by the sender config does not exist.
    #[error("secret {namespace}/{name} referenced by EmailSenderConfig {config_ref} not found")]
    SecretNotFound {
        namespace: String,
        name: String,
        config_ref: String,
    },

    /// The secret exists but carries no `provider` discriminator.
    #[error("missing required provider key in referenced secret {0}")]
    MissingProviderKey(String),

    /// A provider-specific credential field is absent from the secret.
    #[error("provider {provider} requires credential field {field} in the referenced secret")]
    MissingCredential {
        provider: String,
        field: &'static str,
    },

    /// The `provider` discriminator names no registered provider.
    #[error("invalid provider, {0} is not supported")]
    UnsupportedProvider(String),

    /// The provider failed or rejected the send; carries its error text
    /// verbatim so the status field records what the provider said.
    #[error("{0}")]
    Dispatch(String),

    /// Reading or writing cluster state failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}
