//! Custom resource definitions for the delivery domain.
//!
//! Two resources make up the public surface: `Email` describes one send
//! request and carries the reconciler-owned delivery status;
//! `EmailSenderConfig` is a reusable sending identity pointing at a
//! credential secret. Both live in the `mailops.dev/v1` API group.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Desired state of one outbound email.
///
/// The spec is treated as immutable by the reconciler; only `.status` is
/// ever written back.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "mailops.dev",
    version = "v1",
    kind = "Email",
    namespaced,
    status = "EmailStatus",
    shortname = "eml",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.deliveryStatus"}"#,
    printcolumn = r#"{"name":"Recipient","type":"string","jsonPath":".spec.recipientEmail"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSpec {
    /// Name of the `EmailSenderConfig` in the Email's own namespace.
    pub sender_config_ref: String,
    /// Recipient address.
    pub recipient_email: String,
    /// Subject line.
    pub subject: String,
    /// Message body, sent as-is.
    pub body: String,
}

/// Observed delivery state, owned exclusively by the reconciler.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    /// Where the send stands. Absent until first observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    /// Provider message identifier, present iff `Sent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Human-readable failure cause, present iff `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delivery status values.
///
/// Transitions are monotonic: unset → `Pending` → {`Sent` | `Error`}, and
/// the two outcomes are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Display)]
pub enum DeliveryStatus {
    /// Claimed by the reconciler; a send attempt is due or in flight.
    Pending,
    /// Dispatch succeeded; `messageId` holds the normalized identifier.
    Sent,
    /// Dispatch failed; `error` holds the cause. Recovery is manual
    /// (edit the spec or recreate the resource to retrigger).
    Error,
}

impl DeliveryStatus {
    /// Whether no further automatic transition occurs from this value.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Error)
    }
}

/// A named, reusable sending identity shared by many `Email` resources.
///
/// Read-only to the reconciler; observed only to log creation vs update.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "mailops.dev",
    version = "v1",
    kind = "EmailSenderConfig",
    namespaced,
    shortname = "esc"
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSenderConfigSpec {
    /// Address the provider will send from.
    pub sender_email: String,
    /// Name of the secret holding the provider credentials. Looked up in
    /// the sender-config's namespace, defaulting to `default`.
    pub api_token_secret_ref: String,
}
