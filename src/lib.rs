//! ERP API Library
//!
//! Warehousing, manufacturing, purchasing, sales, helpdesk, attendance and
//! project tasks behind one JSON REST surface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod mail;
pub mod migrator;
pub mod openapi;
pub mod pricing;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Extension, Router};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;
use crate::entities::trade_document::DocumentKind;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub started_at: DateTime<Utc>,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    /// Success without a payload, e.g. after a delete
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_only_response_serializes_null_data() {
        let body = serde_json::to_value(ApiResponse::<()>::message("Warehouse deleted")).unwrap();
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
        assert_eq!(body["message"], "Warehouse deleted");
        assert!(body.get("errors").is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

fn trade_document_routes() -> Router<AppState> {
    let mut router = Router::new();
    for kind in [DocumentKind::PurchaseQuotation, DocumentKind::PurchaseOrder] {
        router = router
            .merge(
                handlers::trade_documents::document_read_routes(kind)
                    .with_permission(perm::PURCHASING_READ),
            )
            .merge(
                handlers::trade_documents::document_write_routes(kind)
                    .with_permission(perm::PURCHASING_MANAGE),
            );
    }
    for kind in [DocumentKind::SalesQuotation, DocumentKind::SalesOrder] {
        router = router
            .merge(
                handlers::trade_documents::document_read_routes(kind)
                    .with_permission(perm::SALES_READ),
            )
            .merge(
                handlers::trade_documents::document_write_routes(kind)
                    .with_permission(perm::SALES_MANAGE),
            );
    }
    router
}

/// Everything mounted under `/api`. Only `/auth/login` is reachable without
/// a bearer token.
pub fn api_routes() -> Router<AppState> {
    use handlers::*;

    // Warehousing and stock
    let warehouses_read = warehouses::warehouse_read_routes().with_permission(perm::WAREHOUSES_READ);
    let warehouses_write =
        warehouses::warehouse_write_routes().with_permission(perm::WAREHOUSES_MANAGE);
    let inventory_read = inventory::inventory_routes().with_permission(perm::INVENTORY_READ);
    let transfers_read =
        stock_transfers::transfer_read_routes().with_permission(perm::INVENTORY_READ);
    let transfers_write =
        stock_transfers::transfer_write_routes().with_permission(perm::INVENTORY_TRANSFER);

    // Manufacturing
    let bom_read = bom::bom_read_routes().with_permission(perm::BOMS_READ);
    let bom_write = bom::bom_write_routes().with_permission(perm::BOMS_MANAGE);
    let production_read = production::production_read_routes().with_permission(perm::PRODUCTION_READ);
    let production_write =
        production::production_write_routes().with_permission(perm::PRODUCTION_MANAGE);

    // Purchasing receipts
    let grn_read = grn::grn_read_routes().with_permission(perm::PURCHASING_READ);
    let grn_write = grn::grn_write_routes().with_permission(perm::PURCHASING_RECEIVE);

    // Helpdesk
    let tickets_read = helpdesk::ticket_read_routes().with_permission(perm::HELPDESK_READ);
    let tickets_reply = helpdesk::ticket_reply_routes().with_permission(perm::HELPDESK_REPLY);
    let tickets_manage = helpdesk::ticket_manage_routes().with_permission(perm::HELPDESK_MANAGE);
    let inbound = helpdesk::inbound_routes().with_permission(perm::HELPDESK_INBOUND);

    // HR and projects
    let tasks_read = tasks::task_read_routes().with_permission(perm::TASKS_READ);
    let tasks_write = tasks::task_write_routes().with_permission(perm::TASKS_MANAGE);
    let attendance_read =
        attendance::attendance_read_routes().with_permission(perm::ATTENDANCE_READ);
    let attendance_record =
        attendance::attendance_record_routes().with_permission(perm::ATTENDANCE_RECORD);

    // Parties
    let customers_read = customers::customer_read_routes().with_permission(perm::CUSTOMERS_READ);
    let customers_write =
        customers::customer_write_routes().with_permission(perm::CUSTOMERS_MANAGE);
    let operators_read = operators::operator_read_routes().with_permission(perm::OPERATORS_READ);
    let operators_write =
        operators::operator_write_routes().with_permission(perm::OPERATORS_MANAGE);

    let pricing = pricing::pricing_routes().with_permission(perm::PRICING_USE);

    Router::new()
        // Auth
        .merge(auth::login_routes())
        .merge(auth::session_routes().with_auth())
        // Warehousing and stock
        .merge(warehouses_read)
        .merge(warehouses_write)
        .merge(inventory_read)
        .merge(transfers_read)
        .merge(transfers_write)
        // Manufacturing
        .merge(bom_read)
        .merge(bom_write)
        .merge(production_read)
        .merge(production_write)
        // Purchasing and sales
        .merge(trade_document_routes())
        .merge(grn_read)
        .merge(grn_write)
        // Helpdesk
        .merge(tickets_read)
        .merge(tickets_reply)
        .merge(tickets_manage)
        .merge(inbound)
        // HR and projects
        .merge(tasks_read)
        .merge(tasks_write)
        .merge(attendance_read)
        .merge(attendance_record)
        // Parties
        .merge(customers_read)
        .merge(customers_write)
        .merge(operators_read)
        .merge(operators_write)
        .merge(pricing)
}

/// Router with state, auth wiring, request ids and HTTP tracing. Transport
/// concerns such as CORS and compression are added by the binary.
pub fn app(state: AppState) -> Router {
    let auth_service = state.services.auth.clone();
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            crate::tracing::propagate_request_id,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let status_data = json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "mail_transport": state.config.mail.transport,
        "auto_assign": state.config.assignment_url.is_some(),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Json(ApiResponse::success(status_data))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "uptime_seconds": uptime,
        "timestamp": Utc::now().to_rfc3339(),
    });
    Json(ApiResponse::success(health_data))
}
