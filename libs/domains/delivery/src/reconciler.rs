//! Reconcile driver for Email resources.
//!
//! One invocation runs the whole pipeline: terminal short-circuit, Pending
//! claim, sender-config fetch, credential resolution, provider dispatch,
//! final status write. Cluster access and event publishing are injected, so
//! the driver runs unchanged against the real API server or the in-memory
//! double.
//!
//! Duplicate triggers for one key are serialized by a per-key lock, and the
//! unset→Pending claim is conditional on the resource version, so a racing
//! reconciliation aborts before it can dispatch a second copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterError, EventSink, ResourceAccess, ResourceKey};
use crate::crd::{Email, EmailSenderConfig};
use crate::credentials;
use crate::error::DeliveryError;
use crate::providers::{OutboundEmail, ProviderRegistry, SendResult};
use crate::state::{self, AttemptOutcome, DeliveryEvent, Transition};

/// What the scheduler should do after an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Converged, or nothing to do; wait for the next observed change.
    Done,
    /// A stale read lost an optimistic-concurrency check; run again from a
    /// fresh read.
    Requeue,
}

/// Drives an Email from its observed status toward a delivery outcome.
pub struct DeliveryReconciler<C, E> {
    cluster: Arc<C>,
    events: Arc<E>,
    registry: Arc<ProviderRegistry>,
    inflight: Mutex<HashMap<ResourceKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C, E> DeliveryReconciler<C, E>
where
    C: ResourceAccess,
    E: EventSink,
{
    pub fn new(cluster: Arc<C>, events: Arc<E>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            cluster,
            events,
            registry,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile one Email by key.
    ///
    /// A missing resource is success with nothing to do; deletions are not
    /// errors. Failures during the send pipeline are persisted as an `Error`
    /// status and also returned, so the surrounding scheduler applies its
    /// standard requeue policy.
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<Outcome, DeliveryError> {
        let lock = self.key_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(key).await
        };
        drop(lock);
        self.release_key(key);
        result
    }

    async fn reconcile_locked(&self, key: &ResourceKey) -> Result<Outcome, DeliveryError> {
        let Some(mut email) = self.cluster.get_email(key).await? else {
            debug!(email = %key, "Email is gone, nothing to reconcile");
            return Ok(Outcome::Done);
        };

        if state::is_terminal(email.status.as_ref()) {
            debug!(email = %key, "Delivery already settled");
            return Ok(Outcome::Done);
        }

        if email
            .status
            .as_ref()
            .and_then(|status| status.delivery_status)
            .is_none()
        {
            match self.claim(&mut email).await? {
                Claimed::Yes => {}
                Claimed::Lost => return Ok(Outcome::Requeue),
            }
        }

        let config = match self.sender_config(&email, key).await {
            Ok(config) => config,
            Err(err) => {
                // The attempt is abandoned, not failed: status stays as-is
                // and the resource is eligible for the next observed change.
                let note = format!(
                    "can't find EmailSenderConfig {}",
                    email.spec.sender_config_ref
                );
                warn!(email = %key, error = %err, "Sender config unavailable");
                self.record(&email, &DeliveryEvent::validation(note)).await;
                return Err(err);
            }
        };

        info!(email = %key, recipient = %email.spec.recipient_email, "Sending email");
        let attempt = self.attempt(&email, &config).await;

        let outcome = match &attempt {
            Ok(result) => {
                info!(email = %key, message_id = %result.message_id, "Email sent");
                AttemptOutcome::Delivered {
                    message_id: result.message_id.clone(),
                }
            }
            Err(err) => {
                warn!(email = %key, error = %err, "Email delivery failed");
                AttemptOutcome::Failed {
                    cause: err.to_string(),
                }
            }
        };

        let transition = state::completed(outcome);
        self.apply(&mut email, &transition).await?;
        self.record(&email, &transition.event).await;

        match attempt {
            Ok(_) => Ok(Outcome::Done),
            Err(err) => Err(err),
        }
    }

    /// unset → Pending, persisted before any send is attempted.
    async fn claim(&self, email: &mut Email) -> Result<Claimed, DeliveryError> {
        let transition = state::queued();
        email.status = Some(transition.status.clone());

        match self.cluster.update_status(email).await {
            Ok(stored) => {
                *email = stored;
                self.record(email, &transition.event).await;
                Ok(Claimed::Yes)
            }
            Err(ClusterError::Conflict) => {
                debug!(
                    email = %email_key(email),
                    "Lost the Pending claim to a concurrent reconciliation"
                );
                Ok(Claimed::Lost)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn sender_config(
        &self,
        email: &Email,
        key: &ResourceKey,
    ) -> Result<EmailSenderConfig, DeliveryError> {
        let config_key =
            ResourceKey::new(key.namespace.clone(), email.spec.sender_config_ref.clone());
        match self.cluster.get_sender_config(&config_key).await {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(DeliveryError::SenderConfigNotFound(config_key.name)),
            Err(err) => {
                warn!(config = %config_key, error = %err, "Sender config fetch failed");
                Err(DeliveryError::SenderConfigNotFound(config_key.name))
            }
        }
    }

    /// Resolve credentials and dispatch. At most one provider attempt.
    async fn attempt(
        &self,
        email: &Email,
        config: &EmailSenderConfig,
    ) -> Result<SendResult, DeliveryError> {
        let credentials = credentials::resolve(self.cluster.as_ref(), config).await?;
        let outbound = OutboundEmail {
            sender: config.spec.sender_email.clone(),
            recipient: email.spec.recipient_email.clone(),
            subject: email.spec.subject.clone(),
            body: email.spec.body.clone(),
        };
        self.registry.dispatch(&credentials, &outbound).await
    }

    /// Persist a transition, resolving one version conflict from a fresh
    /// read. Terminal states written by a concurrent reconciliation are
    /// never regressed.
    async fn apply(&self, email: &mut Email, transition: &Transition) -> Result<(), DeliveryError> {
        email.status = Some(transition.status.clone());

        match self.cluster.update_status(email).await {
            Ok(stored) => {
                *email = stored;
                Ok(())
            }
            Err(ClusterError::Conflict) => {
                let key = email_key(email);
                warn!(email = %key, "Status write lost an optimistic-concurrency check, re-reading");

                let Some(fresh) = self.cluster.get_email(&key).await? else {
                    return Ok(());
                };
                if state::is_terminal(fresh.status.as_ref()) {
                    *email = fresh;
                    return Ok(());
                }

                let mut retry = fresh;
                retry.status = Some(transition.status.clone());
                *email = self.cluster.update_status(&retry).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn record(&self, email: &Email, event: &DeliveryEvent) {
        if let Err(err) = self.events.publish(email, event).await {
            warn!(reason = %event.reason, error = %err, "Failed to publish event");
        }
    }

    fn key_lock(&self, key: &ResourceKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.entry(key.clone()).or_default().clone()
    }

    fn release_key(&self, key: &ResourceKey) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(key);
        }
    }
}

enum Claimed {
    Yes,
    Lost,
}

fn email_key(email: &Email) -> ResourceKey {
    ResourceKey::new(
        email.namespace().unwrap_or_else(|| "default".to_string()),
        email.name_any(),
    )
}

/// Log an EmailSenderConfig observation.
///
/// The config reconciler performs no validation side effects; the first
/// generation is its creation, anything later an update.
pub fn observe_sender_config(config: &EmailSenderConfig) {
    let name = config.name_any();
    if config.metadata.generation == Some(1) {
        info!(config = %name, sender = %config.spec.sender_email, "Sender config created");
    } else {
        info!(config = %name, sender = %config.spec.sender_email, "Sender config updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::InMemoryCluster;
    use crate::crd::EmailSenderConfigSpec;
    use crate::providers::MockProvider;

    fn reconciler(
        cluster: Arc<InMemoryCluster>,
        registry: ProviderRegistry,
    ) -> DeliveryReconciler<InMemoryCluster, InMemoryCluster> {
        DeliveryReconciler::new(cluster.clone(), cluster, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_missing_email_is_a_benign_noop() {
        let cluster = Arc::new(InMemoryCluster::new());
        let driver = reconciler(cluster.clone(), ProviderRegistry::new());

        let outcome = driver
            .reconcile(&ResourceKey::new("default", "gone"))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(cluster.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let cluster = Arc::new(InMemoryCluster::new());
        let driver = reconciler(cluster, ProviderRegistry::new());
        let key = ResourceKey::new("default", "gone");

        driver.reconcile(&key).await.unwrap();
        let inflight = driver.inflight.lock().unwrap_or_else(|e| e.into_inner());
        assert!(inflight.is_empty());
    }

    #[test]
    fn test_observe_sender_config_does_not_panic_without_generation() {
        let config = EmailSenderConfig::new(
            "sender",
            EmailSenderConfigSpec {
                sender_email: "noreply@example.com".to_string(),
                api_token_secret_ref: "creds".to_string(),
            },
        );
        observe_sender_config(&config);
    }

    #[tokio::test]
    async fn test_registry_is_shared_not_rebuilt() {
        let cluster = Arc::new(InMemoryCluster::new());
        let mut registry = ProviderRegistry::new();
        let mock = Arc::new(MockProvider::named("mailgun"));
        registry.register(mock.clone());
        let driver = reconciler(cluster, registry);

        assert_eq!(driver.registry.supported(), vec!["mailgun"]);
        assert_eq!(mock.sent_count().await, 0);
    }
}
