use crate::{
    config::AppConfig,
    errors::{ApiError, ServiceError},
    services::Page,
    ApiResponse,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// 200 with the success envelope
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 201 with the success envelope
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// 200 with data and a human readable message
pub fn message_response<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(data).with_message(message)),
    )
        .into_response()
}

/// 200 without data, used by deletes
pub fn deleted_response(message: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::<()>::message(message))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, clamped to the configured maximum
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Page and page size after applying the configured defaults and bounds.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.clamp_page_size(self.per_page))
    }
}

/// List payload inside the success envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = if page.total == 0 {
            0
        } else {
            (page.total + page.per_page - 1) / page.per_page
        };
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages,
        }
    }
}

/// 200 with a page of items
pub fn page_response<T: Serialize>(page: Page<T>) -> Response {
    success_response(PaginatedResponse::from(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total: u64, per_page: u64) -> Page<u8> {
        Page {
            items: vec![],
            total,
            page: 1,
            per_page,
        }
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PaginatedResponse::from(page(0, 20)).total_pages, 0);
        assert_eq!(PaginatedResponse::from(page(20, 20)).total_pages, 1);
        assert_eq!(PaginatedResponse::from(page(21, 20)).total_pages, 2);
    }

    #[test]
    fn pagination_is_clamped_to_config() {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "k".repeat(64),
            3600,
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        config.api_default_page_size = 25;
        config.api_max_page_size = 100;

        let defaults = PaginationParams::default();
        assert_eq!(defaults.resolve(&config), (1, 25));

        let oversized = PaginationParams {
            page: Some(0),
            per_page: Some(5000),
        };
        assert_eq!(oversized.resolve(&config), (1, 100));
    }
}
