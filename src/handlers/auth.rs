use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::resolve_session,
    models::session::Session,
    repositories::admin,
    services::auth as auth_service,
    state::AppState,
};

/// The form payload for login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// The client-side assertion, forwarded verbatim to the verifier.
    /// Real ones are a few kilobytes.
    #[garde(length(min = 1, max = 16384))]
    pub assertion: String,
}

/// The response payload for login and logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// What the client may know about its own session.
#[derive(Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub email: String,
}

#[derive(Serialize)]
pub struct AdminStatus {
    pub email: String,
    pub admin: bool,
}

/// Handles login with an identity assertion.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(payload): Form<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt");
    payload
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid assertion: {}", e)))?;

    let session = auth_service::login(&state, &cookies, &payload.assertion).await?;

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        email: Some(session.email().to_string()),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles logout.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    auth_service::logout(&state, &cookies).await?;

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
        email: None,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Reports whether the caller is authenticated, minting a session cookie if needed.
#[axum::debug_handler]
pub async fn session(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<SessionStatus>> {
    let session = resolve_session(&state.sessions, &cookies).await?;

    Ok(Json(SessionStatus {
        authenticated: session.is_authenticated(),
        email: session.email().to_string(),
    }))
}

/// Reports whether the authenticated caller is on the admin allow-list.
#[axum::debug_handler]
pub async fn admin_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<AdminStatus>> {
    let is_admin = admin::is_admin(state.admins.as_ref(), session.email()).await?;

    Ok(Json(AdminStatus {
        email: session.email().to_string(),
        admin: is_admin,
    }))
}
