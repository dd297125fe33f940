//! Application error handling
//!
//! Every handler and the auth gate return `ApiError`; the `IntoResponse`
//! impl is the single place where internal error kinds are mapped to HTTP
//! status codes and the client-facing `{"message": ...}` body. Auth
//! failures are distinguishable in logs but all surface as 401.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::jwt::TokenError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No authentication token presented")]
    NoCredential,

    #[error("Token rejected: {0}")]
    InvalidToken(TokenError),

    #[error("Token subject no longer exists")]
    UnknownSubject,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid Credentials".to_string())
            }
            ApiError::NoCredential => (
                StatusCode::UNAUTHORIZED,
                "No Authentication Token. Access Denied".to_string(),
            ),
            ApiError::InvalidToken(kind) => {
                warn!(kind = %kind, "token rejected");
                (StatusCode::UNAUTHORIZED, "Token Is Not Valid".to_string())
            }
            ApiError::UnknownSubject => {
                warn!("token subject not found in store");
                (StatusCode::UNAUTHORIZED, "User Not Found".to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Database(err) => {
                error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error".to_string(),
                )
            }
            ApiError::Internal(err) => {
                error!(error = ?err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
