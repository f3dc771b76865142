pub mod estimate_dto;
pub mod quotation_dto;
pub mod response_dto;

use bson::oid::ObjectId;

use crate::util::error::ServiceError;

/// Parses a hex ObjectId supplied by a client, naming the field on failure.
pub fn parse_id(field: &str, value: &str) -> Result<ObjectId, ServiceError> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| ServiceError::Validation(format!("{}: invalid id '{}'", field, value)))
}
