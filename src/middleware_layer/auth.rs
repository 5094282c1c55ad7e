use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    models::session::Session,
    services::session::SessionManager,
    state::AppState,
};

/// Resolves the request's session, persisting it at once if it is fresh.
///
/// A session id therefore exists from the very first page view, before login.
///
/// # Arguments
///
/// * `sessions` - The session manager.
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// The resolved `Session`, or a store error.
pub async fn resolve_session(sessions: &SessionManager, cookies: &Cookies) -> Result<Session> {
    let mut session = sessions.load(cookies).await?;

    if session.is_new() {
        tracing::debug!("💾 Saving new session {}", session.id());
        sessions.save(&mut session, cookies).await?;
    }

    Ok(session)
}

/// True iff the request's session carries a verified email.
///
/// Store failures are errors, never a silent `false`.
pub async fn is_authorized(sessions: &SessionManager, cookies: &Cookies) -> Result<bool> {
    let session = resolve_session(sessions, cookies).await?;
    Ok(session.is_authenticated())
}

/// A middleware that requires a verified identity.
///
/// The resolved `Session` is placed in the request extensions for handlers.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `AppError::Unauthorized` when no email is bound.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    tracing::debug!("🔐 Checking authentication...");

    let session = resolve_session(&state.sessions, &cookies).await?;

    if !session.is_authenticated() {
        tracing::warn!("❌ Session {} has no verified email", session.id());
        return Err(AppError::Unauthorized);
    }

    tracing::debug!("✅ User authenticated: {}", session.email());

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// A middleware that makes sure every visitor holds a session cookie.
///
/// The authorization outcome is ignored; only store failures stop the request.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
pub async fn init_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let session = resolve_session(&state.sessions, &cookies).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
