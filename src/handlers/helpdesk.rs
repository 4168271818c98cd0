use super::common::{
    created_response, map_service_error, page_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    auth::AuthUser,
    entities::ticket::{Priority, TicketStatus},
    errors::ApiError,
    handlers::AppState,
    services::helpdesk::{
        AssignTicketInput, CreateTicketInput, InboundAction, InboundEmailInput, InboundMessage,
        ReplyAuthor, ReplyInput, TicketFilter, UpdateTicketStatusInput,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::IntoParams;
use uuid::Uuid;

pub fn ticket_read_routes() -> Router<AppState> {
    Router::new()
        .route("/helpdesk/tickets", get(list_tickets))
        .route("/helpdesk/tickets/:id", get(get_ticket))
}

/// Creating tickets and answering them
pub fn ticket_reply_routes() -> Router<AppState> {
    Router::new()
        .route("/helpdesk/tickets", post(create_ticket))
        .route("/helpdesk/tickets/:id/reply", post(reply_to_ticket))
}

/// Status and assignment changes
pub fn ticket_manage_routes() -> Router<AppState> {
    Router::new()
        .route("/helpdesk/tickets/:id/status", put(update_ticket_status))
        .route("/helpdesk/tickets/:id/assign", put(assign_ticket))
        .route("/helpdesk/tickets/:id/auto-assign", post(auto_assign_ticket))
}

/// Push target of the mail relay
pub fn inbound_routes() -> Router<AppState> {
    Router::new().route("/helpdesk/inbound", post(receive_inbound_email))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TicketQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<TicketStatus>,
    #[param(value_type = Option<String>)]
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    /// Matches ticket number, subject or customer email
    pub search: Option<String>,
}

/// List tickets
#[utoipa::path(
    get,
    path = "/api/helpdesk/tickets",
    params(TicketQuery, PaginationParams),
    responses((status = 200, description = "Page of tickets")),
    security(("bearer_auth" = [])),
    tag = "helpdesk"
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let filter = TicketFilter {
        status: query.status,
        priority: query.priority,
        assigned_to: query.assigned_to,
        search: query.search,
    };
    let tickets = state
        .services
        .helpdesk
        .list_tickets(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(page_response(tickets))
}

/// Get a ticket with its message thread
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .services
        .helpdesk
        .get_ticket(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ticket))
}

/// Open a ticket and acknowledge it by email
#[utoipa::path(
    post,
    path = "/api/helpdesk/tickets",
    request_body = CreateTicketInput,
    responses(
        (status = 201, description = "Ticket created; acknowledgement delivery is reported"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "helpdesk"
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(payload): Json<CreateTicketInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .helpdesk
        .create_ticket(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(created))
}

/// Reply to the customer, or add an internal note
#[utoipa::path(
    post,
    path = "/api/helpdesk/tickets/{id}/reply",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = ReplyInput,
    responses(
        (status = 201, description = "Message stored; delivery outcome included"),
        (status = 404, description = "Ticket not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "helpdesk"
)]
pub async fn reply_to_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<ReplyInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let operator_id = user.operator_id().map_err(|_| ApiError::Unauthorized)?;
    let operator = state
        .services
        .operators
        .get_operator(operator_id)
        .await
        .map_err(map_service_error)?;
    let author = ReplyAuthor {
        operator_id,
        name: operator.name,
        email: operator.email,
    };
    let outcome = state
        .services
        .helpdesk
        .reply(id, author, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(outcome))
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTicketStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .services
        .helpdesk
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ticket))
}

pub async fn assign_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTicketInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .services
        .helpdesk
        .assign(id, payload.operator_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ticket))
}

/// Ask the assignment endpoint, falling back to the least loaded agent
pub async fn auto_assign_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .helpdesk
        .auto_assign(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

/// Accept an inbound email as raw RFC 5322 text or as JSON fields
#[utoipa::path(
    post,
    path = "/api/helpdesk/inbound",
    request_body(content = InboundEmailInput, description = "JSON fields, or the raw message as text/plain"),
    responses(
        (status = 201, description = "New ticket opened from the email"),
        (status = 200, description = "Threaded onto an existing ticket, or a duplicate"),
        (status = 400, description = "Unreadable message", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "helpdesk"
)]
pub async fn receive_inbound_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("empty message".into()));
    }
    let message = if is_json(&headers) {
        let input: InboundEmailInput = serde_json::from_str(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid inbound payload: {}", e)))?;
        InboundMessage::try_from(input).map_err(map_service_error)?
    } else {
        InboundMessage::from_raw(&body).map_err(map_service_error)?
    };
    debug!(from = %message.from.email, "Inbound email received");

    let outcome = state
        .services
        .helpdesk
        .ingest_inbound(message)
        .await
        .map_err(map_service_error)?;
    info!(
        ticket_id = %outcome.ticket_id,
        action = ?outcome.action,
        "Inbound email processed"
    );

    Ok(match outcome.action {
        InboundAction::Created => created_response(outcome),
        _ => success_response(outcome),
    })
}
