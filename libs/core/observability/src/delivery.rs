//! Delivery-specific metrics for the mail operator.
//!
//! Dispatch-level metrics (`email_send_*`) are emitted where the provider is
//! known, inside the registry; this module covers the reconcile loop.

use metrics::{counter, histogram};

/// Delivery metrics recorder
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record one reconcile invocation.
    pub fn record_reconcile(outcome: &str, duration_ms: u64) {
        counter!("email_reconcile_total", "outcome" => outcome.to_string()).increment(1);
        histogram!("email_reconcile_duration_seconds").record(duration_ms as f64 / 1000.0);

        tracing::debug!(
            outcome = outcome,
            duration_ms = duration_ms,
            "Recorded reconcile"
        );
    }
}
