use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::crypto::cookie_codec::CodecError;
use crate::repositories::session::StoreError;
use crate::services::identity::VerifierError;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error outside of session persistence.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error outside of session persistence.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The pool could not be built.
    #[error("Pool setup error: {0}")]
    PoolSetup(#[from] deadpool_postgres::CreatePoolError),

    /// The session backing store failed.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// The session cookie could not be produced.
    #[error("Session cookie error: {0}")]
    Codec(#[from] CodecError),

    /// The identity verifier could not be reached or answered nonsense.
    #[error("Identity verifier error: {0}")]
    Verifier(#[from] VerifierError),

    /// The verifier rejected the assertion.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request carries no verified identity.
    #[error("Authentication required")]
    Unauthorized,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::PoolSetup(ref e) => {
                tracing::error!("Pool setup error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Store(ref e) => {
                tracing::error!("Session store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session store error".to_string())
            }

            AppError::Codec(ref e) => {
                tracing::error!("Session cookie error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session cookie error".to_string())
            }

            AppError::Verifier(ref e) => {
                tracing::error!("Identity verifier error: {}", e);
                (StatusCode::BAD_GATEWAY, "Identity verifier unavailable".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::debug!("Request without verified identity");
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
