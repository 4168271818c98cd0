use super::common::{message_response, success_response};
use crate::{
    auth::{bearer_token, AuthError, AuthUser, LoginCredentials},
    handlers::AppState,
};
use axum::{
    extract::{Json, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::info;

/// Token issuing route; sits outside every auth gate
pub fn login_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

/// Routes for an already authenticated operator
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Serialize)]
struct CurrentOperator {
    id: String,
    name: Option<String>,
    email: Option<String>,
    roles: Vec<String>,
    permissions: Vec<String>,
}

/// Exchange email and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    let token = state.services.auth.login(&credentials).await?;
    Ok(success_response(token))
}

/// Claims of the calling operator
pub async fn me(user: AuthUser) -> impl IntoResponse {
    success_response(CurrentOperator {
        id: user.user_id,
        name: user.name,
        email: user.email,
        roles: user.roles,
        permissions: user.permissions,
    })
}

/// Revoke the presented token
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingAuth)?;
    state.services.auth.revoke_token(token).await?;
    info!(operator_id = %user.user_id, "Operator logged out");
    Ok(message_response((), "Logged out"))
}
