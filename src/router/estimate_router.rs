use axum::{middleware, routing::{get, post}, Router};
use std::sync::Arc;

use crate::handler::estimate_handler::{
    approve_handler, assign_supervisor_handler, cancel_handler, convert_handler,
    create_final_quotation_handler, customer_response_handler, delete_estimate_handler,
    dispatch_handler, get_estimate_handler, list_estimates_handler, submit_estimate_handler,
    submit_quotation_handler,
};
use crate::middlewares::auth_middleware::{optional_auth, require_auth, AuthState};
use crate::service::estimate_service::EstimateServiceImpl;

pub fn estimate_router(service: Arc<EstimateServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    // Intake is open; a bearer token, when sent, links the estimate to the caller
    let public = Router::new()
        .route("/estimates", post(submit_estimate_handler))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), optional_auth));

    let protected = Router::new()
        .route("/estimates", get(list_estimates_handler))
        .route("/estimates/{id}", get(get_estimate_handler).delete(delete_estimate_handler))
        .route("/estimates/{id}/assign", post(assign_supervisor_handler))
        .route("/estimates/{id}/dispatch", post(dispatch_handler))
        .route("/estimates/{id}/quotations", post(submit_quotation_handler))
        .route("/estimates/{id}/final-quotation", post(create_final_quotation_handler))
        .route("/estimates/{id}/approve", post(approve_handler))
        .route("/estimates/{id}/response", post(customer_response_handler))
        .route("/estimates/{id}/convert", post(convert_handler))
        .route("/estimates/{id}/cancel", post(cancel_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    public.merge(protected).with_state(service)
}
