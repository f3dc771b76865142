use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuotationAuthor {
    Freelancer { id: ObjectId },
    Staff { id: ObjectId },
}

impl QuotationAuthor {
    pub fn id(&self) -> ObjectId {
        match self {
            QuotationAuthor::Freelancer { id } | QuotationAuthor::Staff { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationRole {
    Freelancer,
    Supervisor,
}

impl QuotationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationRole::Freelancer => "freelancer",
            QuotationRole::Supervisor => "supervisor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub sno: u32,
    pub item: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

/// Line items together with every figure derived from them.
///
/// Only [`crate::service::pricing::price_items`] constructs this, so the four
/// totals can never drift from the items and discount they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItems {
    pub items: Vec<QuotationItem>,
    pub subtotal: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub grand_total: f64,
}

/// An itemized proposal attached to an estimate. Never mutated after creation
/// except for the one-time superadmin approval stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quotation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub estimate: ObjectId,
    pub created_by: QuotationAuthor,
    pub role: QuotationRole,
    pub scope_of_work: String,
    pub items: Vec<QuotationItem>,
    pub subtotal: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub grand_total: f64,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub superadmin_approved: bool,
    #[serde(default)]
    pub superadmin_approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Quotation {
    pub fn from_freelancer(
        estimate: ObjectId,
        freelancer: ObjectId,
        scope_of_work: String,
        priced: PricedItems,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(
            estimate,
            QuotationAuthor::Freelancer { id: freelancer },
            QuotationRole::Freelancer,
            scope_of_work,
            priced,
            false,
            now,
        )
    }

    pub fn final_from_supervisor(
        estimate: ObjectId,
        supervisor: ObjectId,
        scope_of_work: String,
        priced: PricedItems,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(
            estimate,
            QuotationAuthor::Staff { id: supervisor },
            QuotationRole::Supervisor,
            scope_of_work,
            priced,
            true,
            now,
        )
    }

    fn build(
        estimate: ObjectId,
        created_by: QuotationAuthor,
        role: QuotationRole,
        scope_of_work: String,
        priced: PricedItems,
        is_final: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Quotation {
            id: ObjectId::new(),
            estimate,
            created_by,
            role,
            scope_of_work,
            items: priced.items,
            subtotal: priced.subtotal,
            discount_percent: priced.discount_percent,
            discount_amount: priced.discount_amount,
            grand_total: priced.grand_total,
            is_final,
            superadmin_approved: false,
            superadmin_approved_at: None,
            created_at: now,
        }
    }
}
