//! In-memory cluster double.
//!
//! Backs the unit and integration tests with deterministic storage: resource
//! versions are monotonically increasing counters and status updates apply
//! the same optimistic-concurrency check the real API server performs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kube::ResourceExt;
use tokio::sync::Mutex;

use super::{ClusterError, EventSink, ResourceAccess, ResourceKey, SecretData};
use crate::crd::{Email, EmailSenderConfig};
use crate::state::DeliveryEvent;

/// An event captured by [`InMemoryCluster`].
#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub email: ResourceKey,
    pub event: DeliveryEvent,
}

/// Deterministic stand-in for the resource store and event recorder.
#[derive(Default)]
pub struct InMemoryCluster {
    emails: Mutex<HashMap<ResourceKey, Email>>,
    sender_configs: Mutex<HashMap<ResourceKey, EmailSenderConfig>>,
    secrets: Mutex<HashMap<ResourceKey, SecretData>>,
    events: Mutex<Vec<RecordedEvent>>,
    conflict_next_update: AtomicBool,
}

fn key_of<K: ResourceExt>(resource: &K) -> ResourceKey {
    ResourceKey::new(
        resource.namespace().unwrap_or_else(|| "default".to_string()),
        resource.name_any(),
    )
}

fn bumped(version: Option<&str>) -> String {
    version
        .and_then(|v| v.parse::<u64>().ok())
        .map(|v| (v + 1).to_string())
        .unwrap_or_else(|| "1".to_string())
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an email, assigning resource version "1" when it has none.
    pub async fn put_email(&self, mut email: Email) -> ResourceKey {
        if email.metadata.resource_version.is_none() {
            email.metadata.resource_version = Some("1".to_string());
        }
        let key = key_of(&email);
        self.emails.lock().await.insert(key.clone(), email);
        key
    }

    pub async fn put_sender_config(&self, config: EmailSenderConfig) -> ResourceKey {
        let key = key_of(&config);
        self.sender_configs.lock().await.insert(key.clone(), config);
        key
    }

    pub async fn put_secret(&self, key: ResourceKey, data: SecretData) {
        self.secrets.lock().await.insert(key, data);
    }

    /// Current copy of the stored email, if any.
    pub async fn email(&self, key: &ResourceKey) -> Option<Email> {
        self.emails.lock().await.get(key).cloned()
    }

    /// Bump the stored resource version, simulating a concurrent writer.
    pub async fn touch_email(&self, key: &ResourceKey) {
        if let Some(email) = self.emails.lock().await.get_mut(key) {
            let next = bumped(email.metadata.resource_version.as_deref());
            email.metadata.resource_version = Some(next);
        }
    }

    /// Make the next status update fail with [`ClusterError::Conflict`],
    /// as if a concurrent writer had won the race.
    pub fn conflict_next_update(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().await.clone()
    }

    pub async fn event_count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl ResourceAccess for InMemoryCluster {
    async fn get_email(&self, key: &ResourceKey) -> Result<Option<Email>, ClusterError> {
        Ok(self.emails.lock().await.get(key).cloned())
    }

    async fn get_sender_config(
        &self,
        key: &ResourceKey,
    ) -> Result<Option<EmailSenderConfig>, ClusterError> {
        Ok(self.sender_configs.lock().await.get(key).cloned())
    }

    async fn get_secret(&self, key: &ResourceKey) -> Result<Option<SecretData>, ClusterError> {
        Ok(self.secrets.lock().await.get(key).cloned())
    }

    async fn update_status(&self, email: &Email) -> Result<Email, ClusterError> {
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Err(ClusterError::Conflict);
        }

        let key = key_of(email);
        let mut emails = self.emails.lock().await;
        let stored = emails
            .get_mut(&key)
            .ok_or_else(|| ClusterError::Api(format!("email {key} not found")))?;

        if stored.metadata.resource_version != email.metadata.resource_version {
            return Err(ClusterError::Conflict);
        }

        // Status subresource semantics: the spec is left untouched.
        let next = bumped(stored.metadata.resource_version.as_deref());
        stored.status = email.status.clone();
        stored.metadata.resource_version = Some(next);
        Ok(stored.clone())
    }
}

#[async_trait]
impl EventSink for InMemoryCluster {
    async fn publish(&self, email: &Email, event: &DeliveryEvent) -> Result<(), ClusterError> {
        self.events.lock().await.push(RecordedEvent {
            email: key_of(email),
            event: event.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DeliveryStatus, EmailSpec, EmailStatus};

    fn email(name: &str) -> Email {
        let mut email = Email::new(
            name,
            EmailSpec {
                sender_config_ref: "sender".to_string(),
                recipient_email: "a@b.com".to_string(),
                subject: "hi".to_string(),
                body: "hello".to_string(),
            },
        );
        email.metadata.namespace = Some("default".to_string());
        email
    }

    #[tokio::test]
    async fn test_put_assigns_resource_version() {
        let cluster = InMemoryCluster::new();
        let key = cluster.put_email(email("a")).await;

        let stored = cluster.email(&key).await.unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_update_status_bumps_version() {
        let cluster = InMemoryCluster::new();
        let key = cluster.put_email(email("a")).await;

        let mut current = cluster.email(&key).await.unwrap();
        current.status = Some(EmailStatus {
            delivery_status: Some(DeliveryStatus::Pending),
            ..EmailStatus::default()
        });

        let stored = cluster.update_status(&current).await.unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(
            stored.status.unwrap().delivery_status,
            Some(DeliveryStatus::Pending)
        );
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let cluster = InMemoryCluster::new();
        let key = cluster.put_email(email("a")).await;

        let mut stale = cluster.email(&key).await.unwrap();
        cluster.touch_email(&key).await;

        stale.status = Some(EmailStatus::default());
        let result = cluster.update_status(&stale).await;
        assert!(matches!(result, Err(ClusterError::Conflict)));
    }

    #[tokio::test]
    async fn test_update_status_never_touches_spec() {
        let cluster = InMemoryCluster::new();
        let key = cluster.put_email(email("a")).await;

        let mut current = cluster.email(&key).await.unwrap();
        current.spec.subject = "tampered".to_string();
        current.status = Some(EmailStatus::default());
        cluster.update_status(&current).await.unwrap();

        let stored = cluster.email(&key).await.unwrap();
        assert_eq!(stored.spec.subject, "hi");
    }
}
