//! HTTP error handling
//!
//! Every failing endpoint answers with the same JSON body: a user-facing
//! `message`, a machine-readable `code` and optional `details`. The status is
//! derived from the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use guildscope_core::services::ServiceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    /// Convert from anyhow::Error
    pub fn from_anyhow(err: anyhow::Error, code: impl Into<String>) -> Self {
        Self {
            message: err.to_string(),
            code: code.into(),
            details: Some(format!("{:?}", err)),
        }
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::new(format!("Record not found: {}", id), "RECORD_NOT_FOUND")
    }

    pub fn unauthenticated() -> Self {
        Self::new("Missing or unknown bearer token", "UNAUTHENTICATED")
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(message, "INVALID_INPUT")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "RECORD_NOT_FOUND" | "ACCOUNT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_REJECTED" => StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_INPUT" => StatusCode::BAD_REQUEST,
            "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "ACCOUNT_EXISTS" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { id } => HttpError::not_found(id),
            ServiceError::ValidationRejected(rejection) => HttpError::with_details(
                rejection.to_string(),
                "VALIDATION_REJECTED",
                rejection.reason(),
            ),
            ServiceError::Unauthorized { .. } => HttpError::new(err.to_string(), "FORBIDDEN"),
            ServiceError::InvalidInput(message) => HttpError::invalid_input(message),
            ServiceError::TransportFailure { .. } => {
                HttpError::new(err.to_string(), "TRANSPORT_FAILURE")
            }
            ServiceError::DatabaseError(e) => HttpError::new(e.to_string(), "DATABASE_ERROR"),
        }
    }
}
