use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Generic message shown whenever the store fails underneath a request.
pub const STORAGE_FAULT_MESSAGE: &str = "Something went wrong, please try again";

#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Bad or missing input; nothing was written.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    /// A business rule refused the request (e.g. logging outside the window).
    #[error("{0}")]
    PolicyViolation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{}", STORAGE_FAULT_MESSAGE)]
    Storage,
}

impl AttendanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttendanceError::Validation(vec![message.into()])
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<String> {
        match self {
            AttendanceError::Validation(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::Unauthorized => StatusCode::UNAUTHORIZED,
            AttendanceError::Forbidden(_) => StatusCode::FORBIDDEN,
            AttendanceError::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AttendanceError::Validation(errors) => json!({ "errors": errors }),
            other => json!({ "message": other.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Logs a store failure and hides it behind [`AttendanceError::Storage`].
pub fn storage_fault(context: &'static str) -> impl Fn(StoreError) -> AttendanceError {
    move |e| {
        tracing::error!(error = %e, "{context}");
        AttendanceError::Storage
    }
}
