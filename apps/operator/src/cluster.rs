//! Kube-backed implementations of the delivery domain's cluster seams.
//!
//! Reads go through typed `Api` handles; status writes use the status
//! subresource so the spec is never perturbed, and the API server's
//! resource-version check surfaces as [`ClusterError::Conflict`]. Events go
//! through the kube-runtime `Recorder`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};

use domain_delivery::{
    ClusterError, DeliveryEvent, Email, EmailSenderConfig, EventSeverity, EventSink,
    ResourceAccess, ResourceKey, SecretData,
};

const CONFLICT: u16 = 409;
const NOT_FOUND: u16 = 404;

/// Cluster access backed by the live API server.
pub struct KubeCluster {
    client: Client,
    recorder: Recorder,
}

impl KubeCluster {
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn emails(&self, namespace: &str) -> Api<Email> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn ignore_not_found<T>(result: Result<T, kube::Error>) -> Result<Option<T>, ClusterError> {
    match result {
        Ok(resource) => Ok(Some(resource)),
        Err(kube::Error::Api(err)) if err.code == NOT_FOUND => Ok(None),
        Err(err) => Err(ClusterError::Api(err.to_string())),
    }
}

#[async_trait]
impl ResourceAccess for KubeCluster {
    async fn get_email(&self, key: &ResourceKey) -> Result<Option<Email>, ClusterError> {
        ignore_not_found(self.emails(&key.namespace).get(&key.name).await)
    }

    async fn get_sender_config(
        &self,
        key: &ResourceKey,
    ) -> Result<Option<EmailSenderConfig>, ClusterError> {
        let api: Api<EmailSenderConfig> = Api::namespaced(self.client.clone(), &key.namespace);
        ignore_not_found(api.get(&key.name).await)
    }

    async fn get_secret(&self, key: &ResourceKey) -> Result<Option<SecretData>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &key.namespace);
        let secret = ignore_not_found(api.get(&key.name).await)?;
        Ok(secret.map(|secret| {
            let map = secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect();
            SecretData::from_map(map)
        }))
    }

    async fn update_status(&self, email: &Email) -> Result<Email, ClusterError> {
        let namespace = email.namespace().unwrap_or_else(|| "default".to_string());
        let name = email.name_any();
        let payload = serde_json::to_vec(email).map_err(|err| ClusterError::Api(err.to_string()))?;

        match self
            .emails(&namespace)
            .replace_status(&name, &PostParams::default(), payload)
            .await
        {
            Ok(stored) => Ok(stored),
            Err(kube::Error::Api(err)) if err.code == CONFLICT => Err(ClusterError::Conflict),
            Err(err) => Err(ClusterError::Api(err.to_string())),
        }
    }
}

#[async_trait]
impl EventSink for KubeCluster {
    async fn publish(&self, email: &Email, event: &DeliveryEvent) -> Result<(), ClusterError> {
        let type_ = match event.severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };

        self.recorder
            .publish(
                &Event {
                    type_,
                    reason: event.reason.to_string(),
                    note: Some(event.note.clone()),
                    action: event.reason.action().to_string(),
                    secondary: None,
                },
                &email.object_ref(&()),
            )
            .await
            .map_err(|err| ClusterError::Api(err.to_string()))
    }
}
