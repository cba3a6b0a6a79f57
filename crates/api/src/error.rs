//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use reports::ReportError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Report generation error.
    Report(ReportError),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(DomainError::Unauthenticated) => (
                StatusCode::UNAUTHORIZED,
                DomainError::Unauthenticated.to_string(),
            ),
            ApiError::Domain(err) => kind_response(err.kind(), err.to_string()),
            ApiError::Report(err) => kind_response(err.kind(), err.to_string()),
        }
    }
}

fn kind_response(kind: ErrorKind, message: String) -> (StatusCode, String) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, message),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, message),
        ErrorKind::Parse => (StatusCode::UNPROCESSABLE_ENTITY, message),
        ErrorKind::Conflict => (StatusCode::CONFLICT, message),
        ErrorKind::Database => {
            tracing::error!(error = %message, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error, please try again later".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Report(err)
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
