use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, ImportError, IntegrationError};

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),

    Forbidden(String),

    NotFound(String),

    ValidationError(String),

    InvalidFile(String),

    MissingColumns(Vec<String>),

    Conflict(String),

    MethodNotAllowed,

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InvalidFile(msg) => write!(f, "Invalid file: {}", msg),
            ApiError::MissingColumns(columns) => {
                write!(f, "Missing required columns: {}", columns.join(", "))
            }
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::MethodNotAllowed => write!(f, "Method not allowed"),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_)
            | ApiError::InvalidFile(_)
            | ApiError::MissingColumns(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code placed in the envelope.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "AUTH_401",
            ApiError::Forbidden(_) => "PERMISSION_403",
            ApiError::NotFound(_) => "DATA_404",
            ApiError::ValidationError(_) => "VALIDATION_400",
            ApiError::InvalidFile(_) => "INVALID_FILE",
            ApiError::MissingColumns(_) => "MISSING_COLUMNS",
            ApiError::Conflict(_) => "CONFLICT_409",
            ApiError::MethodNotAllowed => "METHOD_405",
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => "SERVER_500",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();

        let body = match self {
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                ApiResponse::error(status, code, "A database error occurred")
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiResponse::error(status, code, "An internal error occurred")
            }
            ApiError::MissingColumns(columns) => {
                let message = format!("Missing required columns: {}", columns.join(", "));
                ApiResponse::error(status, code, message)
                    .with_data(json!({ "missing_columns": columns }))
            }
            ApiError::MethodNotAllowed => ApiResponse::error(status, code, "Method not allowed"),
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::ValidationError(msg)
            | ApiError::InvalidFile(msg)
            | ApiError::Conflict(msg) => ApiResponse::error(status, code, msg),
        };

        body.into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::Unauthorized => Self::Unauthorized("Invalid or expired token".to_string()),
            AuthError::Conflict(msg) => Self::Conflict(msg),
            AuthError::Validation(msg) => Self::validation(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidFile(msg) => Self::InvalidFile(msg),
            ImportError::MissingColumns(columns) => Self::MissingColumns(columns),
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::NotFound => Self::NotFound("Integration not found".to_string()),
            IntegrationError::NoneStored => Self::NotFound("No integrations found".to_string()),
            IntegrationError::Forbidden(msg) => Self::Forbidden(msg),
            IntegrationError::Conflict(msg) => Self::Conflict(msg),
            IntegrationError::Validation(msg) => Self::validation(msg),
            IntegrationError::Import(err) => err.into(),
            IntegrationError::Database(msg) => Self::DatabaseError(msg),
            IntegrationError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }
}
