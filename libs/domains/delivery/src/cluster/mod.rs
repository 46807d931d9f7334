//! Cluster access seams for the reconcile driver.
//!
//! The driver never reaches for an ambient client or recorder; it is handed
//! a [`ResourceAccess`] implementation for reads and conditional status
//! writes, and an [`EventSink`] for observability events. The operator
//! binary wires kube-backed implementations; [`memory::InMemoryCluster`]
//! backs the test suite.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::crd::{Email, EmailSenderConfig};
use crate::state::DeliveryEvent;

/// Namespaced identity of a cluster resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque key→bytes credential bag read from a secret.
#[derive(Clone, Default)]
pub struct SecretData(BTreeMap<String, Vec<u8>>);

impl SecretData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Vec<u8>>) -> Self {
        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Value under `key` as UTF-8 text, lossily decoded.
    pub fn utf8(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

// Values are credentials; only the keys may reach logs.
impl fmt::Debug for SecretData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Errors from the cluster storage layer.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Optimistic-concurrency check failed; re-read and retry.
    #[error("resource version conflict on status update")]
    Conflict,

    /// Any other API failure.
    #[error("cluster API error: {0}")]
    Api(String),
}

/// Reads and conditional status writes against the resource store.
#[async_trait]
pub trait ResourceAccess: Send + Sync {
    async fn get_email(&self, key: &ResourceKey) -> Result<Option<Email>, ClusterError>;

    async fn get_sender_config(
        &self,
        key: &ResourceKey,
    ) -> Result<Option<EmailSenderConfig>, ClusterError>;

    async fn get_secret(&self, key: &ResourceKey) -> Result<Option<SecretData>, ClusterError>;

    /// Replace the Email's status subresource, conditional on the resource
    /// version carried in `email.metadata`. A stale version yields
    /// [`ClusterError::Conflict`]. Returns the stored object with its new
    /// resource version; the spec is never touched.
    async fn update_status(&self, email: &Email) -> Result<Email, ClusterError>;
}

/// Publishes observability events against an Email resource.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, email: &Email, event: &DeliveryEvent) -> Result<(), ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_display() {
        let key = ResourceKey::new("default", "welcome-mail");
        assert_eq!(key.to_string(), "default/welcome-mail");
    }

    #[test]
    fn test_secret_data_utf8_lookup() {
        let mut data = SecretData::new();
        data.insert("provider", "mailgun");
        data.insert("token", b"t0ken".to_vec());

        assert_eq!(data.utf8("provider").as_deref(), Some("mailgun"));
        assert!(data.contains("token"));
        assert!(data.utf8("domain").is_none());
    }

    #[test]
    fn test_secret_data_debug_hides_values() {
        let mut data = SecretData::new();
        data.insert("token", "super-secret");

        let rendered = format!("{data:?}");
        assert!(rendered.contains("token"));
        assert!(!rendered.contains("super-secret"));
    }
}
