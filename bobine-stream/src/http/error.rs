// HTTP error handling for the streaming endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::StreamError;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Handler error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn range_not_satisfiable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::RANGE_NOT_SATISFIABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}

impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidRequest(msg) => Self::bad_request(msg),
            StreamError::AssetUnavailable(msg) => Self::not_found(msg),
            StreamError::SessionNotFound(msg) => Self::not_found(format!("session {msg}")),
            StreamError::UnsupportedSubtitle(msg) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
            }
            StreamError::SpawnFailed(msg) => {
                tracing::error!("encoder spawn failed: {}", msg);
                Self::internal("Failed to start encoder")
            }
            StreamError::EncoderFailed(msg) => {
                tracing::error!("encoder failed: {}", msg);
                Self::internal("Encoder error")
            }
            StreamError::HardwareUnavailable(msg) => {
                tracing::error!("hardware encoder unavailable: {}", msg);
                Self::internal("Encoder error")
            }
            StreamError::ProbeParse(msg) => {
                tracing::error!("probe output malformed: {}", msg);
                Self::internal("Media probe error")
            }
            StreamError::Io(e) => {
                tracing::error!("I/O error in streaming handler: {}", e);
                Self::internal("I/O error")
            }
        }
    }
}

impl From<bobine_core::Error> for AppError {
    fn from(err: bobine_core::Error) -> Self {
        use bobine_core::Error;
        match err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::InvalidInput(msg) => Self::bad_request(msg),
            other => {
                tracing::error!("internal error: {}", other);
                Self::internal("Internal server error")
            }
        }
    }
}
