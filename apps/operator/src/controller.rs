//! kube-runtime controllers for the Email and EmailSenderConfig resources.
//!
//! The Email controller delegates to the domain's `DeliveryReconciler`; the
//! sender-config controller only observes. Reconcile errors flow back to
//! kube-runtime, whose error policy requeues with a fixed backoff (a no-op
//! once the status is terminal).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

use domain_delivery::{
    observe_sender_config, DeliveryError, DeliveryReconciler, Email, EmailSenderConfig, Outcome,
    ResourceKey,
};
use observability::DeliveryMetrics;

use crate::cluster::KubeCluster;

/// Requeue delay after a lost optimistic-concurrency race.
const CONFLICT_REQUEUE: Duration = Duration::from_secs(5);

/// Requeue delay applied by the error policy.
const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Reconcile errors surfaced to kube-runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Dependencies injected into every reconcile invocation.
pub struct Context {
    pub reconciler: DeliveryReconciler<KubeCluster, KubeCluster>,
}

fn key_of(email: &Email) -> ResourceKey {
    ResourceKey::new(
        email.namespace().unwrap_or_else(|| "default".to_string()),
        email.name_any(),
    )
}

pub async fn reconcile_email(email: Arc<Email>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = key_of(&email);
    let started = Instant::now();
    let result = ctx.reconciler.reconcile(&key).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Outcome::Done) => {
            DeliveryMetrics::record_reconcile("done", elapsed_ms);
            Ok(Action::await_change())
        }
        Ok(Outcome::Requeue) => {
            DeliveryMetrics::record_reconcile("requeue", elapsed_ms);
            Ok(Action::requeue(CONFLICT_REQUEUE))
        }
        Err(err) => {
            DeliveryMetrics::record_reconcile("error", elapsed_ms);
            Err(err.into())
        }
    }
}

pub fn error_policy(email: Arc<Email>, error: &Error, _ctx: Arc<Context>) -> Action {
    warn!(email = %email.name_any(), error = %error, "Reconcile failed, requeueing");
    Action::requeue(ERROR_REQUEUE)
}

pub async fn reconcile_sender_config(
    config: Arc<EmailSenderConfig>,
    _ctx: Arc<Context>,
) -> Result<Action, Error> {
    observe_sender_config(&config);
    Ok(Action::await_change())
}

pub fn config_error_policy(
    config: Arc<EmailSenderConfig>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    warn!(config = %config.name_any(), error = %error, "Sender config reconcile failed");
    Action::requeue(ERROR_REQUEUE)
}

/// Run both controllers until the process receives a shutdown signal.
pub async fn run_controllers(client: Client, context: Arc<Context>, watch_namespace: Option<&str>) {
    let emails: Api<Email> = match watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let configs: Api<EmailSenderConfig> = match watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client),
    };

    let email_controller = Controller::new(emails, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_email, error_policy, context.clone())
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(object = %object, "Reconciled email"),
                Err(error) => warn!(error = %error, "Email reconcile dispatch failed"),
            }
        });

    let config_controller = Controller::new(configs, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_sender_config, config_error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(object = %object, "Observed sender config"),
                Err(error) => warn!(error = %error, "Sender config dispatch failed"),
            }
        });

    tokio::join!(email_controller, config_controller);
}
