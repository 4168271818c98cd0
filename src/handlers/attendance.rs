use super::common::{
    created_response, map_service_error, page_response, success_response, PaginationParams,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::attendance::{AttendanceFilter, CheckInInput, CheckOutInput},
};
use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn attendance_read_routes() -> Router<AppState> {
    Router::new()
        .route("/attendance", get(list_records))
        .route("/attendance/summary", get(summary))
}

pub fn attendance_record_routes() -> Router<AppState> {
    Router::new()
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub operator_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AttendanceQuery {
    fn checked_range(&self) -> Result<(), ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::ValidationError(
                    "from must not be after to".into(),
                ));
            }
        }
        Ok(())
    }
}

/// The operator a request acts for. Recording for someone else is reserved
/// to managers.
fn acting_operator(user: &AuthUser, requested: Option<Uuid>) -> Result<Uuid, ApiError> {
    let caller = user.operator_id().map_err(|_| ApiError::Unauthorized)?;
    match requested {
        Some(other) if other != caller => {
            if user.is_admin() || user.has_role("manager") {
                Ok(other)
            } else {
                Err(ApiError::ServiceError(
                    crate::errors::ServiceError::Forbidden(
                        "only managers may record attendance for others".into(),
                    ),
                ))
            }
        }
        _ => Ok(caller),
    }
}

/// Open today's attendance record
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInInput,
    responses(
        (status = 201, description = "Checked in"),
        (status = 409, description = "Already checked in today", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "attendance"
)]
pub async fn check_in(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<CheckInInput>>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let operator_id = acting_operator(&user, input.operator_id)?;
    let record = state
        .services
        .attendance
        .check_in(operator_id, input.notes)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(record))
}

/// Close today's attendance record
pub async fn check_out(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<CheckOutInput>>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let operator_id = acting_operator(&user, input.operator_id)?;
    let record = state
        .services
        .attendance
        .check_out(operator_id, input.notes)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(record))
}

pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    query.checked_range()?;
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = AttendanceFilter {
        operator_id: query.operator_id,
        from: query.from,
        to: query.to,
    };
    let records = state
        .services
        .attendance
        .list_records(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(records))
}

/// Days present and minutes worked over a range; defaults to the caller
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AttendanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.checked_range()?;
    let operator_id = match query.operator_id {
        Some(id) => id,
        None => user.operator_id().map_err(|_| ApiError::Unauthorized)?,
    };
    let summary = state
        .services
        .attendance
        .summary(operator_id, query.from, query.to)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}
