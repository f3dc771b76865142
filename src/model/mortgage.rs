use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::estimate::{Estimate, LeadType, MobileNumber};
use crate::model::lead::{generate_reference, Customer, LeadStatus, PropertyLead};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortgageApplication {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub application_id: String,
    pub lead: ObjectId,
    pub customer: ObjectId,
    pub estimate: ObjectId,
    pub loan_amount: f64,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

/// Empty document folder the customer fills in later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub application_id: String,
    pub customer: ObjectId,
    #[serde(default)]
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBasicDetails {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub application_id: String,
    pub customer: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: MobileNumber,
    pub created_at: DateTime<Utc>,
}

/// The mortgage application with its two supporting shells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortgageBundle {
    pub application: MortgageApplication,
    pub document: CustomerDocument,
    pub basic_details: CustomerBasicDetails,
}

/// Every record a conversion writes. Persisted as one unit or not at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionBundle {
    pub lead: PropertyLead,
    pub mortgage: Option<MortgageBundle>,
}

impl ConversionBundle {
    pub fn for_estimate(
        estimate: &Estimate,
        customer: &Customer,
        quotation: Option<ObjectId>,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let lead = PropertyLead {
            id: ObjectId::new(),
            lead_id: generate_reference("LEAD", now),
            customer: customer.id,
            estimate: estimate.id,
            quotation,
            name: estimate.customer_name.clone(),
            email: estimate.customer_email.clone(),
            mobile: estimate.customer_mobile.clone(),
            category: estimate.category,
            lead_type: estimate.lead_type,
            amount,
            status: LeadStatus::New,
            source: "estimate".to_string(),
            created_at: now,
        };

        let mortgage = match estimate.lead_type {
            LeadType::Sales => None,
            LeadType::Mortgage => {
                let application_id = generate_reference("APP", now);
                let (first_name, last_name) = split_name(&lead.name);
                Some(MortgageBundle {
                    application: MortgageApplication {
                        id: ObjectId::new(),
                        application_id: application_id.clone(),
                        lead: lead.id,
                        customer: customer.id,
                        estimate: estimate.id,
                        loan_amount: amount,
                        status: ApplicationStatus::Draft,
                        created_at: now,
                    },
                    document: CustomerDocument {
                        id: ObjectId::new(),
                        application_id: application_id.clone(),
                        customer: customer.id,
                        documents: Vec::new(),
                        created_at: now,
                    },
                    basic_details: CustomerBasicDetails {
                        id: ObjectId::new(),
                        application_id,
                        customer: customer.id,
                        first_name,
                        last_name,
                        email: lead.email.clone(),
                        mobile: lead.mobile.clone(),
                        created_at: now,
                    },
                })
            }
        };

        ConversionBundle { lead, mortgage }
    }
}

/// First word is the first name, the rest is the last name.
pub fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}
