use super::common::{
    created_response, deleted_response, map_service_error, page_response, success_response,
    validate_input, PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::customers::{CreateCustomerInput, UpdateCustomerInput},
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

pub fn customer_read_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(get_customer))
}

pub fn customer_write_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", post(create_customer))
        .route("/customers/:id", put(update_customer).delete(delete_customer))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerQuery {
    /// Matches name, email or company
    pub search: Option<String>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let customers = state
        .services
        .customers
        .list_customers(query.search, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(customers))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let customer = state
        .services
        .customers
        .create_customer(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let customer = state
        .services
        .customers
        .update_customer(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .customers
        .delete_customer(id)
        .await
        .map_err(map_service_error)?;
    Ok(deleted_response("Customer deleted"))
}
