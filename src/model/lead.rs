use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::model::estimate::{LeadType, MobileNumber};

/// Downstream customer identity, deduplicated by email or mobile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub mobile: MobileNumber,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: String, email: String, mobile: MobileNumber, now: DateTime<Utc>) -> Self {
        Customer {
            id: ObjectId::new(),
            name,
            email: email.to_lowercase(),
            mobile,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, LeadStatus::Converted)
    }
}

/// Sales deal record created from an accepted estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyLead {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub lead_id: String,
    pub customer: ObjectId,
    pub estimate: ObjectId,
    pub quotation: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub mobile: MobileNumber,
    pub category: ObjectId,
    pub lead_type: LeadType,
    pub amount: f64,
    pub status: LeadStatus,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Builds a human readable reference such as `LEAD-20250101-7QX2MA`.
pub fn generate_reference(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reference_carries_prefix_and_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let reference = generate_reference("LEAD", now);
        assert!(reference.starts_with("LEAD-20250309-"));
        assert_eq!(reference.len(), "LEAD-20250309-".len() + 6);
    }

    #[test]
    fn only_converted_leads_are_closed() {
        assert!(LeadStatus::New.is_open());
        assert!(LeadStatus::Lost.is_open());
        assert!(!LeadStatus::Converted.is_open());
    }
}
