use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::user::{Actor, Role};

/// Master workflow state of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    Pending,
    Assigned,
    FinalCreated,
    SuperadminApproved,
    CustomerAccepted,
    CustomerRejected,
    Cancelled,
    Deal,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Pending => "pending",
            EstimateStatus::Assigned => "assigned",
            EstimateStatus::FinalCreated => "final_created",
            EstimateStatus::SuperadminApproved => "superadmin_approved",
            EstimateStatus::CustomerAccepted => "customer_accepted",
            EstimateStatus::CustomerRejected => "customer_rejected",
            EstimateStatus::Cancelled => "cancelled",
            EstimateStatus::Deal => "deal",
        }
    }

    /// Statuses reachable in one step. Terminal statuses have none.
    pub fn successors(&self) -> &'static [EstimateStatus] {
        use EstimateStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[FinalCreated, Cancelled],
            FinalCreated => &[SuperadminApproved, Cancelled],
            SuperadminApproved => &[CustomerAccepted, CustomerRejected, Cancelled],
            CustomerAccepted => &[Deal],
            CustomerRejected | Cancelled | Deal => &[],
        }
    }

    pub fn can_advance_to(&self, next: EstimateStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_advance_to(EstimateStatus::Cancelled)
    }
}

impl std::fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EstimateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use EstimateStatus::*;
        match s {
            "pending" => Ok(Pending),
            "assigned" => Ok(Assigned),
            "final_created" => Ok(FinalCreated),
            "superadmin_approved" => Ok(SuperadminApproved),
            "customer_accepted" => Ok(CustomerAccepted),
            "customer_rejected" => Ok(CustomerRejected),
            "cancelled" => Ok(Cancelled),
            "deal" => Ok(Deal),
            other => Err(format!("Invalid estimate status: {}", other)),
        }
    }
}

/// Progress of the freelancer dispatch-and-collect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorProgress {
    #[default]
    #[serde(rename = "none")]
    NotStarted,
    RequestSent,
    RequestCompleted,
    FinalQuotationCreated,
}

impl SupervisorProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorProgress::NotStarted => "none",
            SupervisorProgress::RequestSent => "request_sent",
            SupervisorProgress::RequestCompleted => "request_completed",
            SupervisorProgress::FinalQuotationCreated => "final_quotation_created",
        }
    }
}

impl std::fmt::Display for SupervisorProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of the customer-facing approval cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerProgress {
    #[default]
    #[serde(rename = "none")]
    NotStarted,
    SentToCustomer,
    CustomerResponded,
    DealCreated,
}

impl CustomerProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerProgress::NotStarted => "none",
            CustomerProgress::SentToCustomer => "sent_to_customer",
            CustomerProgress::CustomerResponded => "customer_responded",
            CustomerProgress::DealCreated => "deal_created",
        }
    }
}

impl std::fmt::Display for CustomerProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which downstream records a converted estimate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadType {
    #[default]
    Sales,
    Mortgage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileNumber {
    pub country_code: String,
    pub number: String,
}

impl std::fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.country_code, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreelancerQuotation {
    pub freelancer: ObjectId,
    pub quotation: ObjectId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerResponseStatus {
    Accepted,
    Rejected,
}

impl CustomerResponseStatus {
    pub fn resulting_status(&self) -> EstimateStatus {
        match self {
            CustomerResponseStatus::Accepted => EstimateStatus::CustomerAccepted,
            CustomerResponseStatus::Rejected => EstimateStatus::CustomerRejected,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerResponse {
    pub status: Option<CustomerResponseStatus>,
    pub reason: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// A customer's request for pricing and the aggregate root of its workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub customer: ObjectId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_mobile: MobileNumber,
    pub category: ObjectId,
    #[serde(default)]
    pub subcategories: Vec<ObjectId>,
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub lead_type: LeadType,

    pub status: EstimateStatus,
    #[serde(default)]
    pub supervisor_progress: SupervisorProgress,
    #[serde(default)]
    pub customer_progress: CustomerProgress,

    #[serde(default)]
    pub assigned_supervisor: Option<ObjectId>,
    #[serde(default)]
    pub assigned_by: Option<ObjectId>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sent_to_freelancers: Vec<ObjectId>,
    #[serde(default)]
    pub freelancer_quotations: Vec<FreelancerQuotation>,
    #[serde(default)]
    pub final_quotation: Option<ObjectId>,
    #[serde(default)]
    pub customer_response: CustomerResponse,

    #[serde(default)]
    pub deal_converted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deal_converted_by: Option<ObjectId>,

    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<ObjectId>,
    #[serde(default)]
    pub cancel_reason: Option<String>,

    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated intake fields for a new estimate.
#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub customer: ObjectId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_mobile: MobileNumber,
    pub category: ObjectId,
    pub subcategories: Vec<ObjectId>,
    pub description: String,
    pub attachments: Vec<String>,
    pub lead_type: LeadType,
}

impl Estimate {
    pub fn pending(new: NewEstimate, now: DateTime<Utc>) -> Self {
        Estimate {
            id: ObjectId::new(),
            customer: new.customer,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_mobile: new.customer_mobile,
            category: new.category,
            subcategories: new.subcategories,
            description: new.description,
            attachments: new.attachments,
            lead_type: new.lead_type,
            status: EstimateStatus::Pending,
            supervisor_progress: SupervisorProgress::NotStarted,
            customer_progress: CustomerProgress::NotStarted,
            assigned_supervisor: None,
            assigned_by: None,
            assigned_at: None,
            sent_to_freelancers: Vec::new(),
            freelancer_quotations: Vec::new(),
            final_quotation: None,
            customer_response: CustomerResponse::default(),
            deal_converted_at: None,
            deal_converted_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_assigned_to(&self, supervisor: &ObjectId) -> bool {
        self.assigned_supervisor.as_ref() == Some(supervisor)
    }

    pub fn is_dispatched_to(&self, freelancer: &ObjectId) -> bool {
        self.sent_to_freelancers.contains(freelancer)
    }

    pub fn has_submitted(&self, freelancer: &ObjectId) -> bool {
        self.freelancer_quotations
            .iter()
            .any(|entry| &entry.freelancer == freelancer)
    }

    /// True once every dispatched freelancer has responded.
    pub fn collection_complete(&self) -> bool {
        !self.sent_to_freelancers.is_empty()
            && self.freelancer_quotations.len() >= self.sent_to_freelancers.len()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Superadmin | Role::Admin => true,
            Role::Supervisor => self.is_assigned_to(&actor.id),
            Role::Freelancer => self.is_dispatched_to(&actor.id),
            Role::Customer => self.customer == actor.id,
        }
    }
}
