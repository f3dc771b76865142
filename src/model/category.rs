use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::estimate::LeadType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    #[default]
    Service,
    Mortgage,
}

impl CategoryKind {
    pub fn lead_type(&self) -> LeadType {
        match self {
            CategoryKind::Service => LeadType::Sales,
            CategoryKind::Mortgage => LeadType::Mortgage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub kind: CategoryKind,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub category: ObjectId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
