use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::handler::quotation_handler::{get_quotation_handler, list_quotations_handler};
use crate::middlewares::auth_middleware::{require_auth, AuthState};
use crate::service::quotation_service::QuotationServiceImpl;

pub fn quotation_router(service: Arc<QuotationServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/quotations", get(list_quotations_handler))
        .route("/quotations/{id}", get(get_quotation_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(service)
}
