use super::common::{map_service_error, success_response};
use crate::{
    errors::ApiError,
    handlers::AppState,
    pricing::{compute_document, LineBreakdown, LineInput, Totals},
};
use axum::{extract::Json, response::IntoResponse, routing::post, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn pricing_routes() -> Router<AppState> {
    Router::new().route("/pricing/calculate", post(calculate))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateRequest {
    pub lines: Vec<LineInput>,
    /// Taken off the sum of line totals
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CalculateResponse {
    pub lines: Vec<LineBreakdown>,
    pub totals: Totals,
}

/// Price a set of lines without storing anything
#[utoipa::path(
    post,
    path = "/api/pricing/calculate",
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Line breakdown and totals", body = CalculateResponse),
        (status = 400, description = "Invalid quantity, rate or percent", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "pricing"
)]
pub async fn calculate(Json(payload): Json<CalculateRequest>) -> Result<impl IntoResponse, ApiError> {
    if payload.lines.is_empty() {
        return Err(ApiError::ValidationError("at least one line is required".into()));
    }
    let (lines, totals) =
        compute_document(&payload.lines, payload.discount_percent).map_err(map_service_error)?;
    Ok(success_response(CalculateResponse { lines, totals }))
}
