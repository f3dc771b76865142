pub mod category;
pub mod estimate;
pub mod estimate_change;
pub mod lead;
pub mod mortgage;
pub mod quotation;
pub mod user;
