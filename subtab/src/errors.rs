use crate::db::errors::DbError;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No Facebook identity in the session; the browser is sent to OAuth
    #[error("Not authenticated with Facebook")]
    Unauthenticated,

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// A form failed validation on save
    #[error("{message}")]
    Validation { message: String },

    /// Requested resource not found
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Facebook Graph/OAuth call failed
    #[error(transparent)]
    Facebook(#[from] crate::facebook::FacebookError),

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::FOUND,
            Error::BadRequest { .. } | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } | Error::Facebook(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Build a 302 Found redirect.
///
/// Axum's `Redirect` only offers 303/307/308; the canvas flows here predate
/// those semantics and the embedding iframe expects a plain 302.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::Database(DbError::Other(_)) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Facebook(_) => {
                tracing::warn!("Facebook API error: {}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated => {
                tracing::info!("Unauthenticated request, redirecting to OAuth");
            }
            Error::BadRequest { .. } | Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        match self {
            Error::Unauthenticated => found("/auth/facebook"),
            Error::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
            }
            Error::Validation { message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": message })),
            )
                .into_response(),
            Error::NotFound { .. } | Error::Database(DbError::NotFound) => crate::views::not_found_page(),
            _ => crate::views::error_page(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
