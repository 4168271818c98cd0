use super::common::{
    created_response, map_service_error, page_response, success_response, validate_input,
    PaginationParams,
};
use crate::{errors::ApiError, handlers::AppState, services::grn::CreateGrnInput};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn grn_read_routes() -> Router<AppState> {
    Router::new()
        .route("/grn", get(list_receipts))
        .route("/grn/:id", get(get_receipt))
}

pub fn grn_write_routes() -> Router<AppState> {
    Router::new().route("/grn", post(create_receipt))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GrnQuery {
    pub purchase_order_id: Option<Uuid>,
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<GrnQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let receipts = state
        .services
        .grn
        .list_receipts(query.purchase_order_id, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .services
        .grn
        .get_receipt(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(receipt))
}

/// Receive goods against an approved purchase order
#[utoipa::path(
    post,
    path = "/api/grn",
    request_body = CreateGrnInput,
    responses(
        (status = 201, description = "Receipt recorded and stock added"),
        (status = 400, description = "Over-receipt or order not receivable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order, line or warehouse not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "grn"
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(payload): Json<CreateGrnInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let receipt = state
        .services
        .grn
        .create_receipt(payload)
        .await
        .map_err(map_service_error)?;
    info!(
        grn_id = %receipt.grn.id,
        purchase_order_id = %receipt.grn.purchase_order_id,
        "Goods received"
    );
    Ok(created_response(receipt))
}
