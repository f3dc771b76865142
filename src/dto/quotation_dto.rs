use serde::Deserialize;

use crate::dto::parse_id;
use crate::model::quotation::QuotationRole;
use crate::repository::quotation_repo::QuotationFilter;
use crate::util::error::ServiceError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationListQuery {
    pub estimate: Option<String>,
    pub author: Option<String>,
    pub role: Option<QuotationRole>,
    pub is_final: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl QuotationListQuery {
    pub fn to_filter(&self) -> Result<QuotationFilter, ServiceError> {
        Ok(QuotationFilter {
            estimate: self.estimate.as_deref().map(|v| parse_id("estimate", v)).transpose()?,
            author: self.author.as_deref().map(|v| parse_id("author", v)).transpose()?,
            role: self.role,
            is_final: self.is_final,
        })
    }
}
