pub mod estimate_router;
pub mod quotation_router;
