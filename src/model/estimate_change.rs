use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};

use crate::model::estimate::{
    CustomerProgress, CustomerResponse, Estimate, EstimateStatus, FreelancerQuotation,
    SupervisorProgress,
};

/// State a stored estimate must still be in for a change to apply.
///
/// Every workflow write is a compare-and-swap: the guard is evaluated against
/// the stored document and the change is applied in the same atomic step.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateGuard {
    pub status: EstimateStatus,
    pub supervisor_progress: Option<SupervisorProgress>,
    pub awaiting_response: bool,
    pub not_converted: bool,
    pub freelancer_not_submitted: Option<ObjectId>,
}

impl EstimateGuard {
    pub fn status(status: EstimateStatus) -> Self {
        EstimateGuard {
            status,
            supervisor_progress: None,
            awaiting_response: false,
            not_converted: false,
            freelancer_not_submitted: None,
        }
    }

    pub fn with_supervisor_progress(mut self, progress: SupervisorProgress) -> Self {
        self.supervisor_progress = Some(progress);
        self
    }

    pub fn awaiting_response(mut self) -> Self {
        self.awaiting_response = true;
        self
    }

    pub fn not_converted(mut self) -> Self {
        self.not_converted = true;
        self
    }

    pub fn freelancer_not_submitted(mut self, freelancer: ObjectId) -> Self {
        self.freelancer_not_submitted = Some(freelancer);
        self
    }

    pub fn matches(&self, estimate: &Estimate) -> bool {
        if estimate.deleted_at.is_some() || estimate.status != self.status {
            return false;
        }
        if let Some(progress) = self.supervisor_progress {
            if estimate.supervisor_progress != progress {
                return false;
            }
        }
        if self.awaiting_response && estimate.customer_response.status.is_some() {
            return false;
        }
        if self.not_converted && estimate.deal_converted_at.is_some() {
            return false;
        }
        if let Some(freelancer) = &self.freelancer_not_submitted {
            if estimate.has_submitted(freelancer) {
                return false;
            }
        }
        true
    }

    /// MongoDB filter selecting the estimate only while the guard holds.
    pub fn to_filter(&self, id: ObjectId) -> Document {
        let mut filter = doc! {
            "_id": id,
            "status": self.status.as_str(),
            "deleted_at": Bson::Null,
        };
        if let Some(progress) = self.supervisor_progress {
            filter.insert("supervisor_progress", progress.as_str());
        }
        if self.awaiting_response {
            filter.insert("customer_response.status", Bson::Null);
        }
        if self.not_converted {
            filter.insert("deal_converted_at", Bson::Null);
        }
        if let Some(freelancer) = self.freelancer_not_submitted {
            filter.insert("freelancer_quotations.freelancer", doc! { "$ne": freelancer });
        }
        filter
    }
}

/// A single typed mutation of an estimate. Each variant is one workflow step.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateChange {
    AssignSupervisor {
        supervisor: ObjectId,
        assigned_by: ObjectId,
        at: DateTime<Utc>,
    },
    DispatchToFreelancers {
        freelancers: Vec<ObjectId>,
    },
    RecordFreelancerQuotation {
        entry: FreelancerQuotation,
    },
    CompleteCollection,
    AttachFinalQuotation {
        quotation: ObjectId,
    },
    ApproveFinalQuotation,
    RecordCustomerResponse {
        response: CustomerResponse,
        status: EstimateStatus,
    },
    ConvertToDeal {
        by: ObjectId,
        at: DateTime<Utc>,
    },
    RevertConversion,
    Cancel {
        by: ObjectId,
        at: DateTime<Utc>,
        reason: Option<String>,
    },
    SoftDelete {
        at: DateTime<Utc>,
    },
}

impl EstimateChange {
    pub fn name(&self) -> &'static str {
        match self {
            EstimateChange::AssignSupervisor { .. } => "assign_supervisor",
            EstimateChange::DispatchToFreelancers { .. } => "dispatch_to_freelancers",
            EstimateChange::RecordFreelancerQuotation { .. } => "record_freelancer_quotation",
            EstimateChange::CompleteCollection => "complete_collection",
            EstimateChange::AttachFinalQuotation { .. } => "attach_final_quotation",
            EstimateChange::ApproveFinalQuotation => "approve_final_quotation",
            EstimateChange::RecordCustomerResponse { .. } => "record_customer_response",
            EstimateChange::ConvertToDeal { .. } => "convert_to_deal",
            EstimateChange::RevertConversion => "revert_conversion",
            EstimateChange::Cancel { .. } => "cancel",
            EstimateChange::SoftDelete { .. } => "soft_delete",
        }
    }

    /// Applies the change to an in-memory estimate.
    pub fn apply(&self, estimate: &mut Estimate, now: DateTime<Utc>) {
        match self {
            EstimateChange::AssignSupervisor { supervisor, assigned_by, at } => {
                estimate.assigned_supervisor = Some(*supervisor);
                estimate.assigned_by = Some(*assigned_by);
                estimate.assigned_at = Some(*at);
                estimate.status = EstimateStatus::Assigned;
            }
            EstimateChange::DispatchToFreelancers { freelancers } => {
                estimate.sent_to_freelancers = freelancers.clone();
                estimate.supervisor_progress = SupervisorProgress::RequestSent;
            }
            EstimateChange::RecordFreelancerQuotation { entry } => {
                estimate.freelancer_quotations.push(entry.clone());
            }
            EstimateChange::CompleteCollection => {
                estimate.supervisor_progress = SupervisorProgress::RequestCompleted;
            }
            EstimateChange::AttachFinalQuotation { quotation } => {
                estimate.final_quotation = Some(*quotation);
                estimate.supervisor_progress = SupervisorProgress::FinalQuotationCreated;
                estimate.status = EstimateStatus::FinalCreated;
            }
            EstimateChange::ApproveFinalQuotation => {
                estimate.status = EstimateStatus::SuperadminApproved;
                estimate.customer_progress = CustomerProgress::SentToCustomer;
            }
            EstimateChange::RecordCustomerResponse { response, status } => {
                estimate.customer_response = response.clone();
                estimate.customer_progress = CustomerProgress::CustomerResponded;
                estimate.status = *status;
            }
            EstimateChange::ConvertToDeal { by, at } => {
                estimate.deal_converted_at = Some(*at);
                estimate.deal_converted_by = Some(*by);
                estimate.status = EstimateStatus::Deal;
                estimate.customer_progress = CustomerProgress::DealCreated;
            }
            EstimateChange::RevertConversion => {
                estimate.deal_converted_at = None;
                estimate.deal_converted_by = None;
                estimate.status = EstimateStatus::CustomerAccepted;
                estimate.customer_progress = CustomerProgress::CustomerResponded;
            }
            EstimateChange::Cancel { by, at, reason } => {
                estimate.cancelled_at = Some(*at);
                estimate.cancelled_by = Some(*by);
                estimate.cancel_reason = reason.clone();
                estimate.status = EstimateStatus::Cancelled;
            }
            EstimateChange::SoftDelete { at } => {
                estimate.deleted_at = Some(*at);
            }
        }
        estimate.updated_at = now;
    }

    /// MongoDB update document equivalent to [`EstimateChange::apply`].
    pub fn to_update(&self, now: DateTime<Utc>) -> Result<Document, bson::ser::Error> {
        let mut set = Document::new();
        let mut update = Document::new();
        match self {
            EstimateChange::AssignSupervisor { supervisor, assigned_by, at } => {
                set.insert("assigned_supervisor", *supervisor);
                set.insert("assigned_by", *assigned_by);
                set.insert("assigned_at", bson::to_bson(at)?);
                set.insert("status", EstimateStatus::Assigned.as_str());
            }
            EstimateChange::DispatchToFreelancers { freelancers } => {
                set.insert("sent_to_freelancers", freelancers.clone());
                set.insert("supervisor_progress", SupervisorProgress::RequestSent.as_str());
            }
            EstimateChange::RecordFreelancerQuotation { entry } => {
                update.insert("$push", doc! { "freelancer_quotations": bson::to_bson(entry)? });
            }
            EstimateChange::CompleteCollection => {
                set.insert("supervisor_progress", SupervisorProgress::RequestCompleted.as_str());
            }
            EstimateChange::AttachFinalQuotation { quotation } => {
                set.insert("final_quotation", *quotation);
                set.insert(
                    "supervisor_progress",
                    SupervisorProgress::FinalQuotationCreated.as_str(),
                );
                set.insert("status", EstimateStatus::FinalCreated.as_str());
            }
            EstimateChange::ApproveFinalQuotation => {
                set.insert("status", EstimateStatus::SuperadminApproved.as_str());
                set.insert("customer_progress", CustomerProgress::SentToCustomer.as_str());
            }
            EstimateChange::RecordCustomerResponse { response, status } => {
                set.insert("customer_response", bson::to_bson(response)?);
                set.insert("customer_progress", CustomerProgress::CustomerResponded.as_str());
                set.insert("status", status.as_str());
            }
            EstimateChange::ConvertToDeal { by, at } => {
                set.insert("deal_converted_at", bson::to_bson(at)?);
                set.insert("deal_converted_by", *by);
                set.insert("status", EstimateStatus::Deal.as_str());
                set.insert("customer_progress", CustomerProgress::DealCreated.as_str());
            }
            EstimateChange::RevertConversion => {
                set.insert("deal_converted_at", Bson::Null);
                set.insert("deal_converted_by", Bson::Null);
                set.insert("status", EstimateStatus::CustomerAccepted.as_str());
                set.insert("customer_progress", CustomerProgress::CustomerResponded.as_str());
            }
            EstimateChange::Cancel { by, at, reason } => {
                set.insert("cancelled_at", bson::to_bson(at)?);
                set.insert("cancelled_by", *by);
                set.insert("cancel_reason", bson::to_bson(reason)?);
                set.insert("status", EstimateStatus::Cancelled.as_str());
            }
            EstimateChange::SoftDelete { at } => {
                set.insert("deleted_at", bson::to_bson(at)?);
            }
        }
        set.insert("updated_at", bson::to_bson(&now)?);
        update.insert("$set", set);
        Ok(update)
    }
}
