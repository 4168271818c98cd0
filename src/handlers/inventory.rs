use super::common::{map_service_error, page_response, success_response, PaginationParams};
use crate::{
    common::normalize_code, errors::ApiError, handlers::AppState,
    services::inventory::BatchFilter,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/batches", get(list_batches))
        .route("/inventory/batches/:id", get(get_batch))
        .route("/inventory/availability/:item_code", get(availability))
        .route("/inventory/lookup", get(lookup_batches))
        .route("/inventory/plan", get(plan_allocation))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BatchQuery {
    pub warehouse_id: Option<Uuid>,
    pub bin_id: Option<Uuid>,
    pub item_code: Option<String>,
    /// Hide emptied batches
    #[serde(default)]
    pub in_stock: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LookupQuery {
    pub item_code: String,
    pub warehouse_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanQuery {
    pub item_code: String,
    pub warehouse_id: Uuid,
    #[param(value_type = String)]
    pub quantity: Decimal,
}

/// List stock batches
#[utoipa::path(
    get,
    path = "/api/inventory/batches",
    params(BatchQuery, PaginationParams),
    responses((status = 200, description = "Page of batches")),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = BatchFilter {
        warehouse_id: query.warehouse_id,
        bin_id: query.bin_id,
        item_code: query.item_code.map(|c| normalize_code(&c)),
        in_stock_only: query.in_stock,
    };
    let batches = state
        .services
        .inventory
        .list_batches(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state
        .services
        .inventory
        .get_batch(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(batch))
}

/// Total on hand for an item, per warehouse
pub async fn availability(
    State(state): State<AppState>,
    Path(item_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .inventory
        .availability(&normalize_code(&item_code))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// Batches the transfer form offers for an item in a warehouse
pub async fn lookup_batches(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let batches = state
        .services
        .inventory
        .lookup_batches(&normalize_code(&query.item_code), query.warehouse_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(batches))
}

/// Preview which batches would be drawn for a quantity
pub async fn plan_allocation(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state
        .services
        .inventory
        .plan(&normalize_code(&query.item_code), query.warehouse_id, query.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(plan))
}
