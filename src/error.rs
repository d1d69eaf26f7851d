//! # Error Handling
//!
//! Application-wide error type and its conversion into HTTP responses.
//!
//! Handlers and middleware return `AppResult<T>`. Anything that reaches
//! `IntoResponse` is rendered as a generic HTML error page: the details are
//! logged, the client only sees the status and a safe message.

use crate::views;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application-wide error type
///
/// `#[from]` lets the `?` operator convert library errors automatically:
/// ```rust,ignore
/// let row = sqlx::query("...").fetch_optional(&pool).await?;
/// // sqlx::Error becomes AppError::Database
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// The SQLite pool behind the document store failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A document store implementation could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reading or writing the session record failed
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A stored document did not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing an uploaded file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed form or body (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A unique field is already taken, e.g. a registered email (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid CSRF token, or acting on someone else's document (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unexpected failures that have no better category (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_)
            | AppError::Session(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

/// The catch-all error stage
///
/// Server-side failures are logged with full detail and shown to the user as
/// a generic message; client errors carry their own message, which is safe
/// to display.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
            "Something went wrong. Please try again later.".to_string()
        } else {
            tracing::debug!(error = %self, "request rejected");
            self.to_string()
        };

        (status, views::error_page(status, &message)).into_response()
    }
}

/// `Result` alias used by handlers, repositories and the document store.
pub type AppResult<T> = Result<T, AppError>;
