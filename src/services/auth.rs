use tower_cookies::Cookies;

use crate::error::{AppError, Result};
use crate::models::auth::AuthResult;
use crate::models::session::Session;
use crate::state::AppState;

/// Verifies `assertion` and, only if the verifier vouches for it, binds the
/// asserted email to the request's session and saves it.
///
/// A rejected assertion or an unreachable verifier leaves the session untouched.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `assertion` - The client-side identity assertion.
///
/// # Returns
///
/// The authenticated `Session`.
pub async fn login(state: &AppState, cookies: &Cookies, assertion: &str) -> Result<Session> {
    let identity = match state.verifier.verify(assertion, &state.audience).await? {
        AuthResult::Verified(identity) => identity,
        AuthResult::Failed { reason } => {
            return Err(AppError::Authentication(reason));
        }
    };

    let mut session = state.sessions.load(cookies).await?;
    session.authenticate(&identity);
    state.sessions.save(&mut session, cookies).await?;

    tracing::info!("✅ {} logged in (session {})", session.email(), session.id());
    Ok(session)
}

/// Clears the session cookie and deletes the backing record.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
pub async fn logout(state: &AppState, cookies: &Cookies) -> Result<()> {
    let session = match state.sessions.load(cookies).await {
        Ok(session) => session,
        Err(e) => {
            cookies.add(state.sessions.removal_cookie());
            return Err(e);
        }
    };

    tracing::info!("👋 Logout for session {}", session.id());
    state.sessions.delete(&session, cookies).await
}
