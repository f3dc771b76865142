use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::dto::estimate_dto::{
    AssignSupervisorRequest, CancelRequest, CustomerResponseRequest, DispatchRequest,
    EstimateListQuery, QuotationRequest, SubmitEstimateRequest,
};
use crate::dto::parse_id;
use crate::dto::response_dto::ApiResponse;
use crate::middlewares::auth_middleware::MaybeActor;
use crate::model::user::Actor;
use crate::service::estimate_service::{EstimateService, EstimateServiceImpl};
use crate::util::error::{HandlerError, ServiceError};

fn validated<T: Validate>(payload: &T) -> Result<(), HandlerError> {
    payload
        .validate()
        .map_err(|e| HandlerError::from(ServiceError::from(e)))
}

pub async fn submit_estimate_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(MaybeActor(actor)): Extension<MaybeActor>,
    payload: Result<Json<SubmitEstimateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    info!("[submit_estimate_handler] Handler called");
    validated(&payload)?;
    let estimate = service.submit_estimate(payload, actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(estimate).with_message("Estimate submitted")),
    ))
}

pub async fn list_estimates_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<EstimateListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Query(query) = query?;
    let filter = query.to_filter()?;
    let page = service
        .list_estimates(filter, query.page, query.limit, &actor)
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn get_estimate_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id("id", &id)?;
    let estimate = service.get_estimate(id, &actor).await?;
    Ok(Json(ApiResponse::ok(estimate)))
}

pub async fn delete_estimate_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id("id", &id)?;
    let estimate = service.delete_estimate(id, &actor).await?;
    Ok(Json(ApiResponse::ok(estimate).with_message("Estimate deleted")))
}

pub async fn assign_supervisor_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<AssignSupervisorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let supervisor = parse_id("supervisor_id", &payload.supervisor_id)?;
    let estimate = service.assign_supervisor(id, supervisor, &actor).await?;
    Ok(Json(ApiResponse::ok(estimate).with_message("Supervisor assigned")))
}

pub async fn dispatch_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let freelancers = payload.freelancers()?;
    let estimate = service.send_to_freelancers(id, freelancers, &actor).await?;
    Ok(Json(ApiResponse::ok(estimate).with_message("Estimate sent to freelancers")))
}

pub async fn submit_quotation_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<QuotationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let submission = service.submit_quotation(id, payload.into(), &actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(submission).with_message("Quotation submitted")),
    ))
}

pub async fn create_final_quotation_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<QuotationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let submission = service.create_final_quotation(id, payload.into(), &actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(submission).with_message("Final quotation created")),
    ))
}

pub async fn approve_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id("id", &id)?;
    let submission = service.approve_final_quotation(id, &actor).await?;
    Ok(Json(ApiResponse::ok(submission).with_message("Final quotation approved")))
}

pub async fn customer_response_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<CustomerResponseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload?;
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let estimate = service
        .customer_response(id, payload.status, payload.reason, &actor)
        .await?;
    Ok(Json(ApiResponse::ok(estimate).with_message("Response recorded")))
}

pub async fn convert_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id("id", &id)?;
    let outcome = service.convert_to_deal(id, &actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(outcome).with_message("Estimate converted to deal")),
    ))
}

/// The body is optional: an empty request cancels without a reason.
pub async fn cancel_handler(
    State(service): State<Arc<EstimateServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, HandlerError> {
    let payload: CancelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            warn!("[cancel_handler] Invalid JSON: {}", e);
            HandlerError::bad_request(format!("Invalid JSON: {}", e))
        })?
    };
    validated(&payload)?;
    let id = parse_id("id", &id)?;
    let estimate = service.cancel(id, payload.reason, &actor).await?;
    Ok(Json(ApiResponse::ok(estimate).with_message("Estimate cancelled")))
}
