//! Request-level errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("User ID must be a positive integer")]
    InvalidId,
    #[error("No user exists with the provided ID")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{action}: {message}")]
    Persistence {
        action: &'static str,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidId => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid request",
            AppError::InvalidId => "Invalid user ID",
            AppError::NotFound => "User not found",
            AppError::Conflict(_) => "Conflict",
            AppError::Persistence { action, .. } => *action,
            AppError::Internal(_) => "Internal server error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Persistence { message, .. } => message.clone(),
            // Internal details stay in the logs.
            AppError::Internal(_) => "An unexpected error occurred".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        let body = ErrorResponse {
            error: self.label().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
