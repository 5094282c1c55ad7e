use std::path::Path;

use axum::{
    Router,
    routing::{get, post},
    middleware::from_fn_with_state,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

pub mod config;
pub mod error;
pub mod state;
pub mod db;

pub mod crypto {
    pub mod aes;
    pub mod cookie_codec;
}

pub mod models {
    pub mod auth;
    pub mod session;
}

pub mod repositories {
    pub mod admin;
    pub mod session;
}

pub mod services {
    pub mod auth;
    pub mod identity;
    pub mod session;
}

pub mod handlers {
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
}

use state::AppState;

/// Builds the application router.
///
/// `/` serves `index.html` after making sure the visitor holds a session;
/// unmatched paths fall back to static files under `public_dir`. Tracing and
/// the cookie layer wrap the fallback as well.
pub fn router(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    let public_dir = public_dir.as_ref();

    let index_routes = Router::new()
        .route_service("/", ServeFile::new(public_dir.join("index.html")))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::init_session,
        ));

    let auth_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::session))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/admin", get(handlers::auth::admin_status))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(index_routes)
        .merge(auth_routes)
        .merge(protected_routes)
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}
