//! Mail Operator Service
//!
//! Watches `Email` and `EmailSenderConfig` custom resources and drives each
//! Email to a delivery outcome through the configured provider.
//!
//! ## Architecture
//!
//! ```text
//! API server (watch: emails, emailsenderconfigs)
//!   ↓ (kube-runtime Controller per resource)
//! DeliveryReconciler<KubeCluster, KubeCluster>
//!   ↓ (credential secret → ProviderRegistry)
//! Mailgun / MailerSend HTTPS APIs
//!   ↓
//! Email .status + Events
//! ```
//!
//! ## Features
//!
//! - Registry-based provider dispatch, logged at startup
//! - Status writes guarded by the resource-version concurrency check
//! - Health/readiness probes and Prometheus metrics for Kubernetes
//! - Graceful shutdown on SIGINT/SIGTERM via kube-runtime

pub mod cluster;
pub mod controller;
pub mod health;

use std::sync::Arc;

use eyre::{Result, WrapErr};
use kube::Client;
use tokio::net::TcpListener;
use tracing::{error, info};

use core_config::operator::OperatorConfig;
use core_config::server::HealthServerConfig;
use core_config::{app_info, Environment, FromEnv};
use domain_delivery::{DeliveryReconciler, ProviderRegistry};

use crate::cluster::KubeCluster;
use crate::controller::{run_controllers, Context};
use crate::health::{health_router, HealthState};

const CONTROLLER_NAME: &str = "mailops-operator";

/// Start the health and metrics HTTP server
async fn serve_health(state: HealthState, address: String) -> Result<()> {
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {address}"))?;

    info!(address = %address, "Health server listening");

    axum::serve(listener, health_router(state))
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the mail operator
///
/// This is the main entry point. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Builds the kube client and the provider registry
/// 3. Starts the health/metrics server in the background
/// 4. Runs the Email and EmailSenderConfig controllers until shutdown
///
/// # Errors
///
/// Returns an error if configuration is invalid, the kube client cannot be
/// built, or the controllers fail fatally.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    observability::init_metrics();

    let info = app_info!();
    info!(name = %info.name, version = %info.version, environment = ?environment, "Starting mail operator");

    let operator_config =
        OperatorConfig::from_env().wrap_err("Failed to load operator configuration")?;
    let health_config =
        HealthServerConfig::from_env().wrap_err("Failed to load health server configuration")?;

    let client = Client::try_default()
        .await
        .wrap_err("Failed to build Kubernetes client")?;

    let registry = Arc::new(ProviderRegistry::standard());
    info!(providers = ?registry.supported(), "Provider registry ready");

    let cluster = Arc::new(KubeCluster::new(client.clone(), CONTROLLER_NAME));
    let context = Arc::new(Context {
        reconciler: DeliveryReconciler::new(cluster.clone(), cluster, registry),
    });

    let health_state = HealthState {
        name: info.name,
        version: info.version,
        client: client.clone(),
    };
    let health_address = health_config.address();
    tokio::spawn(async move {
        if let Err(e) = serve_health(health_state, health_address).await {
            error!(error = %e, "Health server failed");
        }
    });

    match &operator_config.watch_namespace {
        Some(namespace) => info!(namespace = %namespace, "Watching single namespace"),
        None => info!("Watching all namespaces"),
    }
    run_controllers(client, context, operator_config.watch_namespace.as_deref()).await;

    info!("Mail operator stopped");
    Ok(())
}
