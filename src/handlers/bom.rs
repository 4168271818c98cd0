use super::common::{
    created_response, deleted_response, map_service_error, page_response, success_response,
    validate_input, PaginationParams,
};
use crate::{
    entities::bom::BomStatus,
    errors::ApiError,
    handlers::AppState,
    services::bom::{CreateBomInput, UpdateBomInput},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn bom_read_routes() -> Router<AppState> {
    Router::new()
        .route("/bom", get(list_boms))
        .route("/bom/:id", get(get_bom))
        .route("/bom/:id/requirements", get(get_requirements))
}

pub fn bom_write_routes() -> Router<AppState> {
    Router::new()
        .route("/bom", post(create_bom))
        .route("/bom/:id", put(update_bom).delete(delete_bom))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BomQuery {
    /// Matches BOM number, product code or product name
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub status: Option<BomStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequirementsQuery {
    /// Units to produce; defaults to the BOM batch size
    #[param(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
}

/// List BOMs
#[utoipa::path(
    get,
    path = "/api/bom",
    params(BomQuery, PaginationParams),
    responses((status = 200, description = "Page of BOMs")),
    security(("bearer_auth" = [])),
    tag = "bom"
)]
pub async fn list_boms(
    State(state): State<AppState>,
    Query(query): Query<BomQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let boms = state
        .services
        .bom
        .list_boms(query.search, query.status, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(boms))
}

/// Get a BOM with its lines
pub async fn get_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let bom = state.services.bom.get_bom(id).await.map_err(map_service_error)?;
    Ok(success_response(bom))
}

/// Create a BOM
#[utoipa::path(
    post,
    path = "/api/bom",
    request_body = CreateBomInput,
    responses(
        (status = 201, description = "BOM created"),
        (status = 400, description = "Invalid lines", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bom"
)]
pub async fn create_bom(
    State(state): State<AppState>,
    Json(payload): Json<CreateBomInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let bom = state
        .services
        .bom
        .create_bom(payload)
        .await
        .map_err(map_service_error)?;
    info!(bom_id = %bom.bom.id, "BOM created");
    Ok(created_response(bom))
}

/// Update a BOM; `lines` replaces all lines
pub async fn update_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBomInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let bom = state
        .services
        .bom
        .update_bom(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(bom))
}

pub async fn delete_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.bom.delete_bom(id).await.map_err(map_service_error)?;
    Ok(deleted_response("BOM deleted"))
}

/// Material and resource needs for producing a quantity
pub async fn get_requirements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RequirementsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let produce = match query.quantity {
        Some(quantity) => quantity,
        None => {
            state
                .services
                .bom
                .get_bom(id)
                .await
                .map_err(map_service_error)?
                .bom
                .quantity
        }
    };
    let requirements = state
        .services
        .bom
        .requirements(id, produce)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requirements))
}
