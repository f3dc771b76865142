use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use tracing::{info, warn, Instrument};

use crate::model::estimate::{CustomerResponseStatus, Estimate};

/// Something that happened to an estimate and is worth telling someone about.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    EstimateReceived,
    SupervisorAssigned { supervisor: ObjectId },
    SentToFreelancers { freelancers: Vec<ObjectId> },
    QuotationSubmitted { freelancer: ObjectId, quotation: ObjectId },
    QuotationsCollected,
    FinalQuotationCreated { quotation: ObjectId },
    SentToCustomer { quotation: ObjectId, grand_total: f64 },
    CustomerResponded { status: CustomerResponseStatus, reason: Option<String> },
    DealCreated { lead_id: String, application_id: Option<String> },
    Cancelled { reason: Option<String> },
}

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Operations,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::EstimateReceived => "estimate_received",
            WorkflowEvent::SupervisorAssigned { .. } => "supervisor_assigned",
            WorkflowEvent::SentToFreelancers { .. } => "sent_to_freelancers",
            WorkflowEvent::QuotationSubmitted { .. } => "quotation_submitted",
            WorkflowEvent::QuotationsCollected => "quotations_collected",
            WorkflowEvent::FinalQuotationCreated { .. } => "final_quotation_created",
            WorkflowEvent::SentToCustomer { .. } => "sent_to_customer",
            WorkflowEvent::CustomerResponded { .. } => "customer_responded",
            WorkflowEvent::DealCreated { .. } => "deal_created",
            WorkflowEvent::Cancelled { .. } => "cancelled",
        }
    }

    pub fn audience(&self) -> Audience {
        match self {
            WorkflowEvent::EstimateReceived
            | WorkflowEvent::SentToCustomer { .. }
            | WorkflowEvent::Cancelled { .. } => Audience::Customer,
            _ => Audience::Operations,
        }
    }
}

/// An event plus the estimate context a channel needs to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub estimate_id: ObjectId,
    pub customer_name: String,
    pub customer_email: String,
    pub event: WorkflowEvent,
}

impl Notification {
    pub fn for_estimate(estimate: &Estimate, event: WorkflowEvent) -> Self {
        Notification {
            estimate_id: estimate.id,
            customer_name: estimate.customer_name.clone(),
            customer_email: estimate.customer_email.clone(),
            event,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes each notification to the log. Used when no SMTP relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            estimate_id = %notification.estimate_id,
            event = notification.event.name(),
            audience = ?notification.event.audience(),
            "Workflow notification"
        );
        Ok(())
    }
}

/// Sends `notification` on a background task. Failures are logged and
/// never reach the caller.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    let span = tracing::info_span!(
        "notify",
        estimate_id = %notification.estimate_id,
        event = notification.event.name()
    );
    tokio::spawn(
        async move {
            if let Err(e) = notifier.notify(&notification).await {
                warn!("Notification failed: {}", e);
            }
        }
        .instrument(span),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), NotificationError> {
            Err(NotificationError::Unavailable("smtp down".to_string()))
        }
    }

    fn notification(event: WorkflowEvent) -> Notification {
        Notification {
            estimate_id: ObjectId::new(),
            customer_name: "Nour".to_string(),
            customer_email: "nour@example.com".to_string(),
            event,
        }
    }

    #[test]
    fn customer_facing_events_target_the_customer() {
        assert_eq!(WorkflowEvent::EstimateReceived.audience(), Audience::Customer);
        assert_eq!(WorkflowEvent::QuotationsCollected.audience(), Audience::Operations);
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        dispatch(Arc::new(FailingNotifier), notification(WorkflowEvent::EstimateReceived));
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let result = LogNotifier.notify(&notification(WorkflowEvent::QuotationsCollected)).await;
        assert!(result.is_ok());
    }
}
