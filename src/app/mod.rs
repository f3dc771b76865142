pub mod app;

pub use app::{build_router, App};
