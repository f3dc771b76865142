pub mod estimate_handler;
pub mod quotation_handler;
