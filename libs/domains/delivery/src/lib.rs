//! Email delivery domain.
//!
//! Reconciles `Email` custom resources from a desired-state description to
//! an observed delivery outcome, dispatching through pluggable third-party
//! providers selected at runtime by a credential secret.
//!
//! ## Components
//!
//! - **CRDs**: `Email`, `EmailSenderConfig` (`crd`)
//! - **Credential resolver**: secret → (provider, fields) (`credentials`)
//! - **Provider dispatcher**: `ProviderRegistry` over `EmailProvider`
//!   implementations (Mailgun, MailerSend, and a capturing mock)
//!   (`providers`)
//! - **Delivery state machine**: pure status transitions + events (`state`)
//! - **Reconcile driver**: `DeliveryReconciler`, generic over the injected
//!   [`ResourceAccess`] / [`EventSink`] seams (`reconciler`)
//!
//! The operator binary supplies kube-backed cluster access; tests run the
//! identical driver against `cluster::memory::InMemoryCluster`.

pub mod cluster;
pub mod crd;
pub mod credentials;
pub mod error;
pub mod providers;
pub mod reconciler;
pub mod state;

pub use cluster::{ClusterError, EventSink, ResourceAccess, ResourceKey, SecretData};
pub use crd::{DeliveryStatus, Email, EmailSenderConfig, EmailSenderConfigSpec, EmailSpec, EmailStatus};
pub use credentials::ResolvedCredentials;
pub use error::{DeliveryError, DeliveryResult};
pub use providers::{
    EmailProvider, MailerSendProvider, MailgunProvider, MockProvider, OutboundEmail,
    ProviderRegistry, SendResult,
};
pub use reconciler::{observe_sender_config, DeliveryReconciler, Outcome};
pub use state::{AttemptOutcome, DeliveryEvent, EventReason, EventSeverity};
