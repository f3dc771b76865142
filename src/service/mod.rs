pub mod estimate_service;
pub mod pricing;
pub mod quotation_service;
pub mod transition;
