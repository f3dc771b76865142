use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::parse_id;
use crate::model::estimate::{CustomerResponseStatus, Estimate, EstimateStatus};
use crate::model::mortgage::ConversionBundle;
use crate::model::quotation::Quotation;
use crate::repository::estimate_repo::EstimateFilter;
use crate::service::pricing::{ItemDraft, QuotationDraft};
use crate::util::error::ServiceError;
use crate::util::mobile::MobileInput;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitEstimateRequest {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub customer_name: String,

    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: String,

    pub customer_mobile: MobileInput,

    pub category: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub subcategories: Vec<String>,

    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignSupervisorRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub supervisor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchRequest {
    #[validate(length(min = 1, message = "at least one freelancer is required"))]
    pub freelancer_ids: Vec<String>,
}

impl DispatchRequest {
    pub fn freelancers(&self) -> Result<Vec<ObjectId>, ServiceError> {
        self.freelancer_ids
            .iter()
            .map(|id| parse_id("freelancer_ids", id))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuotationItemRequest {
    pub sno: Option<u32>,
    #[validate(length(min = 1, max = 200))]
    pub item: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl From<QuotationItemRequest> for ItemDraft {
    fn from(item: QuotationItemRequest) -> Self {
        ItemDraft {
            sno: item.sno,
            item: item.item,
            description: item.description,
            unit: item.unit,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Body of both freelancer and final quotation submissions. Totals are
/// computed server side; any totals a client sends are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuotationRequest {
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub scope_of_work: String,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<QuotationItemRequest>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub discount_percent: Option<f64>,
}

impl From<QuotationRequest> for QuotationDraft {
    fn from(request: QuotationRequest) -> Self {
        QuotationDraft {
            scope_of_work: request.scope_of_work,
            items: request.items.into_iter().map(ItemDraft::from).collect(),
            discount_percent: request.discount_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerResponseRequest {
    pub status: CustomerResponseStatus,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EstimateListQuery {
    pub status: Option<String>,
    pub supervisor: Option<String>,
    pub freelancer: Option<String>,
    pub customer: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl EstimateListQuery {
    pub fn to_filter(&self) -> Result<EstimateFilter, ServiceError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<EstimateStatus>)
            .transpose()
            .map_err(ServiceError::Validation)?;
        let optional_id = |field: &str, value: &Option<String>| value.as_deref().map(|v| parse_id(field, v)).transpose();
        Ok(EstimateFilter {
            status,
            supervisor: optional_id("supervisor", &self.supervisor)?,
            freelancer: optional_id("freelancer", &self.freelancer)?,
            customer: optional_id("customer", &self.customer)?,
            include_deleted: self.include_deleted,
        })
    }
}

/// Result of a quotation submission: the stored quotation and the estimate
/// as it stands after the submission was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct QuotationSubmission {
    pub estimate: Estimate,
    pub quotation: Quotation,
}

/// Result of converting an estimate: the estimate in status `deal` and every
/// record created for it.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    pub estimate: Estimate,
    #[serde(flatten)]
    pub records: ConversionBundle,
}
