use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::dto::parse_id;
use crate::dto::quotation_dto::QuotationListQuery;
use crate::dto::response_dto::ApiResponse;
use crate::model::user::Actor;
use crate::service::quotation_service::{QuotationService, QuotationServiceImpl};
use crate::util::error::HandlerError;

pub async fn list_quotations_handler(
    State(service): State<Arc<QuotationServiceImpl>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<QuotationListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Query(query) = query?;
    let filter = query.to_filter()?;
    let page = service
        .list_quotations(filter, query.page, query.limit, &actor)
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn get_quotation_handler(
    State(service): State<Arc<QuotationServiceImpl>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id("id", &id)?;
    let quotation = service.get_quotation(id, &actor).await?;
    Ok(Json(ApiResponse::ok(quotation)))
}
