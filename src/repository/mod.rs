pub mod catalog_repo;
pub mod customer_repo;
pub mod estimate_repo;
pub mod lead_repo;
pub mod memory;
pub mod mongo;
pub mod quotation_repo;
pub mod repository_error;
pub mod stores;
pub mod user_repo;
