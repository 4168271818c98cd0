use super::common::{
    created_response, deleted_response, map_service_error, page_response, success_response,
    validate_input, PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::warehouses::{
        CreateBinInput, CreateWarehouseInput, UpdateBinInput, UpdateWarehouseInput,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn warehouse_read_routes() -> Router<AppState> {
    Router::new()
        .route("/warehouse", get(list_warehouses))
        .route("/warehouse/:id", get(get_warehouse))
        .route("/warehouse/:id/bins", get(list_bins))
}

pub fn warehouse_write_routes() -> Router<AppState> {
    Router::new()
        .route("/warehouse", axum::routing::post(create_warehouse))
        .route(
            "/warehouse/:id",
            put(update_warehouse).delete(delete_warehouse),
        )
        .route("/warehouse/:id/bins", axum::routing::post(create_bin))
        .route("/warehouse/:id/bins/:bin_id", put(update_bin).delete(delete_bin))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarehouseQuery {
    /// Matches code or name
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// List warehouses
#[utoipa::path(
    get,
    path = "/api/warehouse",
    params(WarehouseQuery, PaginationParams),
    responses(
        (status = 200, description = "Page of warehouses"),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warehouse"
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(filter): Query<WarehouseQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let warehouses = state
        .services
        .warehouses
        .list_warehouses(filter.search, filter.active, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(warehouses))
}

/// Get a warehouse with its bins
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let warehouse = state
        .services
        .warehouses
        .get_warehouse(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(warehouse))
}

/// Create a warehouse
#[utoipa::path(
    post,
    path = "/api/warehouse",
    request_body = CreateWarehouseInput,
    responses(
        (status = 201, description = "Warehouse created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warehouse"
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(payload): Json<CreateWarehouseInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let warehouse = state
        .services
        .warehouses
        .create_warehouse(payload)
        .await
        .map_err(map_service_error)?;
    info!(warehouse_id = %warehouse.id, "Warehouse created");
    Ok(created_response(warehouse))
}

/// Update a warehouse
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWarehouseInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let warehouse = state
        .services
        .warehouses
        .update_warehouse(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(warehouse))
}

/// Delete a warehouse that holds no stock
pub async fn delete_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .warehouses
        .delete_warehouse(id)
        .await
        .map_err(map_service_error)?;
    Ok(deleted_response("Warehouse deleted"))
}

pub async fn list_bins(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let bins = state
        .services
        .warehouses
        .list_bins(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(bins))
}

pub async fn create_bin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateBinInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let bin = state
        .services
        .warehouses
        .create_bin(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(bin))
}

/// Bins are addressed through their warehouse; a bin of another warehouse
/// is reported as missing.
async fn check_bin_owner(state: &AppState, warehouse_id: Uuid, bin_id: Uuid) -> Result<(), ApiError> {
    let bin = state
        .services
        .warehouses
        .find_bin(bin_id)
        .await
        .map_err(map_service_error)?;
    if bin.warehouse_id != warehouse_id {
        return Err(ApiError::NotFound(format!(
            "Bin {} not found in warehouse {}",
            bin_id, warehouse_id
        )));
    }
    Ok(())
}

pub async fn update_bin(
    State(state): State<AppState>,
    Path((id, bin_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateBinInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    check_bin_owner(&state, id, bin_id).await?;
    let bin = state
        .services
        .warehouses
        .update_bin(bin_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(bin))
}

pub async fn delete_bin(
    State(state): State<AppState>,
    Path((id, bin_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    check_bin_owner(&state, id, bin_id).await?;
    state
        .services
        .warehouses
        .delete_bin(bin_id)
        .await
        .map_err(map_service_error)?;
    Ok(deleted_response("Bin deleted"))
}
