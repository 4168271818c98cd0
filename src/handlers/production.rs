use super::common::{
    created_response, map_service_error, page_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    entities::production_order::ProductionStatus,
    errors::ApiError,
    handlers::AppState,
    services::production::{
        CreateProductionOrderInput, ProductionFilter, UpdateProductionStatusInput,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn production_read_routes() -> Router<AppState> {
    Router::new()
        .route("/production-order", get(list_orders))
        .route("/production-order/:id", get(get_order))
}

pub fn production_write_routes() -> Router<AppState> {
    Router::new()
        .route("/production-order", post(create_order))
        .route("/production-order/:id/status", put(update_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductionQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<ProductionStatus>,
    pub product_code: Option<String>,
}

/// List production orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ProductionQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = ProductionFilter {
        status: query.status,
        product_code: query.product_code,
    };
    let orders = state
        .services
        .production
        .list_orders(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(orders))
}

/// Get a production order with its items
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .production
        .get_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Create a production order; items come from the BOM when omitted
#[utoipa::path(
    post,
    path = "/api/production-order",
    request_body = CreateProductionOrderInput,
    responses(
        (status = 201, description = "Production order created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "BOM or warehouse not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "production"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductionOrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .production
        .create_order(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(order))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductionStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .production
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
