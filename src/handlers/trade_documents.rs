//! Quotation and order routes. The four document kinds share one set of
//! handlers; each kind's router carries its [`DocumentKind`] as a request
//! extension.

use super::common::{
    created_response, deleted_response, map_service_error, message_response, page_response,
    success_response, validate_input, PaginationParams,
};
use crate::{
    entities::trade_document::{DocumentKind, DocumentStatus},
    errors::ApiError,
    handlers::AppState,
    services::trade_documents::{
        CreateDocumentInput, DocumentFilter, UpdateDocumentInput, UpdateDocumentStatusInput,
    },
};
use axum::{
    extract::{Extension, Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

/// URL segment of a document kind
pub fn route_segment(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::PurchaseQuotation => "/purchase-quotation",
        DocumentKind::PurchaseOrder => "/purchase-order",
        DocumentKind::SalesQuotation => "/sales-quotation",
        DocumentKind::SalesOrder => "/sales-order",
    }
}

pub fn document_read_routes(kind: DocumentKind) -> Router<AppState> {
    let base = route_segment(kind);
    Router::new()
        .route(base, get(list_documents))
        .route(&format!("{}/:id", base), get(get_document))
        .layer(Extension(kind))
}

pub fn document_write_routes(kind: DocumentKind) -> Router<AppState> {
    let base = route_segment(kind);
    let mut router = Router::new()
        .route(base, post(create_document))
        .route(
            &format!("{}/:id", base),
            put(update_document).delete(delete_document),
        )
        .route(&format!("{}/:id/status", base), put(update_status));
    if kind.is_quotation() {
        router = router.route(&format!("{}/:id/convert", base), post(convert_quotation));
    }
    router.layer(Extension(kind))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<DocumentStatus>,
    pub customer_id: Option<Uuid>,
    /// Matches document number or party name
    pub search: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Query(query): Query<DocumentQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
        if from > to {
            return Err(ApiError::ValidationError(
                "from_date must not be after to_date".into(),
            ));
        }
    }
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = DocumentFilter {
        status: query.status,
        customer_id: query.customer_id,
        search: query.search,
        from_date: query.from_date,
        to_date: query.to_date,
    };
    let documents = state
        .services
        .trade_documents
        .list_documents(kind, filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .services
        .trade_documents
        .get_document(kind, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(document))
}

pub async fn create_document(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Json(payload): Json<CreateDocumentInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let document = state
        .services
        .trade_documents
        .create_document(kind, payload)
        .await
        .map_err(map_service_error)?;
    info!(
        document_id = %document.document.id,
        kind = %kind,
        "Document created"
    );
    Ok(created_response(document))
}

pub async fn update_document(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let document = state
        .services
        .trade_documents
        .update_document(kind, id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .trade_documents
        .delete_document(kind, id)
        .await
        .map_err(map_service_error)?;
    Ok(deleted_response(format!("{} deleted", kind.label())))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .services
        .trade_documents
        .update_status(kind, id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(document))
}

/// Create the matching order from an approved quotation
pub async fn convert_quotation(
    State(state): State<AppState>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let conversion = state
        .services
        .trade_documents
        .convert_quotation(kind, id)
        .await
        .map_err(map_service_error)?;
    let message = format!(
        "{} {} created",
        conversion.order.document.kind.label(),
        conversion.order.document.document_number
    );
    Ok(message_response(conversion, message))
}
