//! Delivery state machine.
//!
//! Pure transition logic: given the current status and, where relevant, the
//! outcome of a dispatch attempt, compute the status to persist and the
//! event to emit. No I/O happens here; the reconcile driver applies the
//! result through its injected cluster access.

use strum::Display;

use crate::crd::{DeliveryStatus, EmailStatus};

/// Event severity, mirroring the cluster event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// Reason tag attached to every emitted event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum EventReason {
    /// First observation claimed the resource.
    Queued,
    /// Dispatch succeeded.
    Send,
    /// Resolution or dispatch failed.
    Failed,
    /// The sender config itself could not be fetched.
    Validation,
}

impl EventReason {
    /// Short verb for event recorders that want an action field.
    pub fn action(self) -> &'static str {
        match self {
            EventReason::Queued => "Queue",
            EventReason::Send | EventReason::Failed => "Send",
            EventReason::Validation => "Validate",
        }
    }
}

/// A structured observability event attached to an Email resource.
#[derive(Clone, Debug)]
pub struct DeliveryEvent {
    pub severity: EventSeverity,
    pub reason: EventReason,
    pub note: String,
}

impl DeliveryEvent {
    pub fn validation(note: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Warning,
            reason: EventReason::Validation,
            note: note.into(),
        }
    }
}

/// Outcome of one dispatch attempt, as seen by the state machine.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    /// The provider accepted the message.
    Delivered {
        /// Already-normalized message identifier (may be empty).
        message_id: String,
    },
    /// Resolution or dispatch failed.
    Failed { cause: String },
}

/// A status to persist together with the event describing it.
#[derive(Clone, Debug)]
pub struct Transition {
    pub status: EmailStatus,
    pub event: DeliveryEvent,
}

/// Whether the status is settled and reconciliation must no-op.
pub fn is_terminal(status: Option<&EmailStatus>) -> bool {
    status
        .and_then(|s| s.delivery_status)
        .map(DeliveryStatus::is_terminal)
        .unwrap_or(false)
}

/// unset → `Pending`.
///
/// Persisted before any send attempt, so a crash mid-dispatch is re-observed
/// as `Pending` rather than re-claimed as new.
pub fn queued() -> Transition {
    Transition {
        status: EmailStatus {
            delivery_status: Some(DeliveryStatus::Pending),
            message_id: None,
            error: None,
        },
        event: DeliveryEvent {
            severity: EventSeverity::Normal,
            reason: EventReason::Queued,
            note: "Email queued".to_string(),
        },
    }
}

/// `Pending` → {`Sent` | `Error`}, depending on the attempt outcome.
pub fn completed(outcome: AttemptOutcome) -> Transition {
    match outcome {
        AttemptOutcome::Delivered { message_id } => Transition {
            status: EmailStatus {
                delivery_status: Some(DeliveryStatus::Sent),
                message_id: Some(message_id),
                error: None,
            },
            event: DeliveryEvent {
                severity: EventSeverity::Normal,
                reason: EventReason::Send,
                note: "Email sent".to_string(),
            },
        },
        AttemptOutcome::Failed { cause } => Transition {
            status: EmailStatus {
                delivery_status: Some(DeliveryStatus::Error),
                message_id: None,
                error: Some(cause.clone()),
            },
            event: DeliveryEvent {
                severity: EventSeverity::Warning,
                reason: EventReason::Failed,
                note: cause,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_and_pending_are_not_terminal() {
        assert!(!is_terminal(None));
        assert!(!is_terminal(Some(&EmailStatus::default())));
        assert!(!is_terminal(Some(&queued().status)));
    }

    #[test]
    fn test_outcomes_are_terminal() {
        let sent = completed(AttemptOutcome::Delivered {
            message_id: "MSG123@d".to_string(),
        });
        let failed = completed(AttemptOutcome::Failed {
            cause: "boom".to_string(),
        });

        assert!(is_terminal(Some(&sent.status)));
        assert!(is_terminal(Some(&failed.status)));
    }

    #[test]
    fn test_queued_transition() {
        let transition = queued();
        assert_eq!(
            transition.status.delivery_status,
            Some(DeliveryStatus::Pending)
        );
        assert!(transition.status.message_id.is_none());
        assert!(transition.status.error.is_none());
        assert_eq!(transition.event.reason, EventReason::Queued);
        assert_eq!(transition.event.severity, EventSeverity::Normal);
    }

    #[test]
    fn test_delivered_records_message_id() {
        let transition = completed(AttemptOutcome::Delivered {
            message_id: "MSG123@d".to_string(),
        });

        assert_eq!(transition.status.delivery_status, Some(DeliveryStatus::Sent));
        assert_eq!(transition.status.message_id.as_deref(), Some("MSG123@d"));
        assert!(transition.status.error.is_none());
        assert_eq!(transition.event.reason, EventReason::Send);
    }

    #[test]
    fn test_failure_records_cause_and_warns() {
        let transition = completed(AttemptOutcome::Failed {
            cause: "invalid provider, sendgrid is not supported".to_string(),
        });

        assert_eq!(
            transition.status.delivery_status,
            Some(DeliveryStatus::Error)
        );
        assert!(transition.status.message_id.is_none());
        assert_eq!(
            transition.status.error.as_deref(),
            Some("invalid provider, sendgrid is not supported")
        );
        assert_eq!(transition.event.severity, EventSeverity::Warning);
        assert_eq!(transition.event.note, transition.status.error.unwrap());
    }

    #[test]
    fn test_event_reason_actions() {
        assert_eq!(EventReason::Queued.action(), "Queue");
        assert_eq!(EventReason::Send.action(), "Send");
        assert_eq!(EventReason::Failed.action(), "Send");
        assert_eq!(EventReason::Validation.action(), "Validate");
    }
}
