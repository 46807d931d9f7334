//! Observability utilities for the mail operator.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Delivery/reconcile metric helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, DeliveryMetrics};
//!
//! init_metrics();
//! DeliveryMetrics::record_reconcile("done", 420);
//! let exposition = render_metrics();
//! ```

pub mod delivery;

pub use delivery::DeliveryMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup; later calls return the existing handle.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    let handle = METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
    });

    match handle {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Render the current metric exposition (empty until [`init_metrics`] ran).
pub fn render_metrics() -> String {
    match METRICS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        "email_reconcile_total",
        "Reconcile invocations by outcome (done, requeue, error)"
    );
    describe_histogram!(
        "email_reconcile_duration_seconds",
        "Reconcile invocation duration in seconds"
    );
    describe_counter!(
        "email_send_total",
        "Dispatch attempts by provider and outcome"
    );
    describe_histogram!(
        "email_send_duration_seconds",
        "Dispatch attempt duration in seconds"
    );
}
