use super::common::{
    created_response, deleted_response, map_service_error, page_response, success_response,
    validate_input, PaginationParams,
};
use crate::{
    entities::operator::OperatorRole,
    errors::ApiError,
    handlers::AppState,
    services::operators::{CreateOperatorInput, OperatorFilter, UpdateOperatorInput},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn operator_read_routes() -> Router<AppState> {
    Router::new()
        .route("/operators", get(list_operators))
        .route("/operators/:id", get(get_operator))
}

pub fn operator_write_routes() -> Router<AppState> {
    Router::new()
        .route("/operators", post(create_operator))
        .route("/operators/:id", put(update_operator).delete(deactivate_operator))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OperatorQuery {
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub role: Option<OperatorRole>,
    pub active: Option<bool>,
}

pub async fn list_operators(
    State(state): State<AppState>,
    Query(query): Query<OperatorQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = OperatorFilter {
        search: query.search,
        role: query.role,
        active: query.active,
    };
    let operators = state
        .services
        .operators
        .list_operators(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(operators))
}

pub async fn get_operator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let operator = state
        .services
        .operators
        .get_operator(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(operator))
}

pub async fn create_operator(
    State(state): State<AppState>,
    Json(payload): Json<CreateOperatorInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let operator = state
        .services
        .operators
        .create_operator(payload)
        .await
        .map_err(map_service_error)?;
    info!(operator_id = %operator.id, "Operator account created");
    Ok(created_response(operator))
}

pub async fn update_operator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOperatorInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let operator = state
        .services
        .operators
        .update_operator(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(operator))
}

/// Operators are deactivated, never removed
pub async fn deactivate_operator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .operators
        .delete_operator(id)
        .await
        .map_err(map_service_error)?;
    Ok(deleted_response("Operator deactivated"))
}
