use super::common::{
    created_response, deleted_response, map_service_error, page_response, success_response,
    validate_input, PaginationParams,
};
use crate::{
    entities::task::TaskStatus,
    errors::ApiError,
    handlers::AppState,
    services::tasks::{CreateTaskInput, TaskFilter, UpdateTaskInput, UpdateTaskStatusInput},
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

pub fn task_read_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
}

pub fn task_write_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/:id", put(update_task).delete(delete_task))
        .route("/tasks/:id/status", put(update_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    pub project: Option<String>,
    pub assigned_to: Option<Uuid>,
    #[param(value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    /// Only open tasks past their due date
    #[serde(default)]
    pub overdue: bool,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = TaskFilter {
        project: query.project,
        assigned_to: query.assigned_to,
        status: query.status,
        overdue: query.overdue,
    };
    let tasks = state
        .services
        .tasks
        .list_tasks(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.services.tasks.get_task(id).await.map_err(map_service_error)?;
    Ok(success_response(task))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let task = state
        .services
        .tasks
        .create_task(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let task = state
        .services
        .tasks
        .update_task(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(task))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .services
        .tasks
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.tasks.delete_task(id).await.map_err(map_service_error)?;
    Ok(deleted_response("Task deleted"))
}
