use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope wrapped around every response body.
///
/// All four keys are always present; `error_code` and `data` serialize as `null` when unset.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub error_code: Option<&'static str>,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            error_code: None,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error_code: Some(error_code),
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

impl ApiResponse<()> {
    /// Success without a payload; `data` is `null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            error_code: None,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct CallerDto {
    pub user_id: i32,
    pub username: String,
    pub is_admin: bool,
    pub is_staff: bool,
}
