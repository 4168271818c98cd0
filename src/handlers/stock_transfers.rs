use super::common::{
    created_response, map_service_error, page_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::stock_transfer::{CreateTransferInput, TransferFromProductionInput},
};
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

pub fn transfer_read_routes() -> Router<AppState> {
    Router::new()
        .route("/stock-transfer", get(list_transfers))
        .route("/stock-transfer/:id", get(get_transfer))
}

pub fn transfer_write_routes() -> Router<AppState> {
    Router::new()
        .route("/stock-transfer", post(create_transfer))
        .route(
            "/production-order/:id/transfer",
            post(create_from_production_order),
        )
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferQuery {
    pub production_order_id: Option<Uuid>,
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let transfers = state
        .services
        .stock_transfers
        .list_transfers(query.production_order_id, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(transfers))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state
        .services
        .stock_transfers
        .get_transfer(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(transfer))
}

/// Post a manual stock transfer
#[utoipa::path(
    post,
    path = "/api/stock-transfer",
    request_body = CreateTransferInput,
    responses(
        (status = 201, description = "Transfer posted"),
        (status = 400, description = "Invalid lines or warehouses", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock for one or more items", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfer"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let transfer = state
        .services
        .stock_transfers
        .create_transfer(payload)
        .await
        .map_err(map_service_error)?;
    info!(transfer_id = %transfer.transfer.id, "Stock transfer posted");
    Ok(created_response(transfer))
}

/// Move the outstanding materials of a production order to its target
/// warehouse
#[utoipa::path(
    post,
    path = "/api/production-order/{id}/transfer",
    params(("id" = Uuid, Path, description = "Production order id")),
    request_body = TransferFromProductionInput,
    responses(
        (status = 201, description = "Transfer posted"),
        (status = 400, description = "Order cannot take transfers", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock in the source warehouse", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfer"
)]
pub async fn create_from_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransferFromProductionInput>>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let transfer = state
        .services
        .stock_transfers
        .create_from_production_order(id, input)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(transfer))
}
