use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::repository::repository_error::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerErrorKind {
    NotFound,
    Validation,
    Internal,
    Unauthorized,
    Forbidden,
    Conflict,
    BadRequest,
    PreconditionFailed,
    DependencyFailure,
}

impl std::fmt::Display for HandlerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandlerErrorKind::NotFound => "NotFound",
            HandlerErrorKind::Validation => "Validation",
            HandlerErrorKind::Internal => "Internal",
            HandlerErrorKind::Unauthorized => "Unauthorized",
            HandlerErrorKind::Forbidden => "Forbidden",
            HandlerErrorKind::Conflict => "Conflict",
            HandlerErrorKind::BadRequest => "BadRequest",
            HandlerErrorKind::PreconditionFailed => "PreconditionFailed",
            HandlerErrorKind::DependencyFailure => "DependencyFailure",
        };
        write!(f, "{}", s)
    }
}

/// Error body returned at the HTTP boundary: `{success: false, error, message, details}`.
#[derive(Debug, Serialize)]
pub struct HandlerError {
    pub success: bool,
    pub error: HandlerErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl HandlerError {
    pub fn new(error: HandlerErrorKind, message: impl Into<String>) -> Self {
        HandlerError {
            success: false,
            error,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::Unauthorized, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error {
            HandlerErrorKind::NotFound => StatusCode::NOT_FOUND,
            HandlerErrorKind::Validation | HandlerErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            HandlerErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerErrorKind::Forbidden => StatusCode::FORBIDDEN,
            HandlerErrorKind::Conflict => StatusCode::CONFLICT,
            HandlerErrorKind::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            HandlerErrorKind::DependencyFailure => StatusCode::BAD_GATEWAY,
            HandlerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = axum::Json(self);
        (status, body).into_response()
    }
}

impl From<JsonRejection> for HandlerError {
    fn from(rejection: JsonRejection) -> Self {
        HandlerError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for HandlerError {
    fn from(rejection: QueryRejection) -> Self {
        HandlerError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        let kind = match &err {
            ServiceError::Validation(_) => HandlerErrorKind::Validation,
            ServiceError::PreconditionFailed { .. } => HandlerErrorKind::PreconditionFailed,
            ServiceError::ConcurrentModification(_)
            | ServiceError::AlreadyConverted(_)
            | ServiceError::DuplicateLeadWindow(_)
            | ServiceError::DuplicateSubmission(_)
            | ServiceError::Conflict(_) => HandlerErrorKind::Conflict,
            ServiceError::NotFound(_) => HandlerErrorKind::NotFound,
            ServiceError::Forbidden(_) => HandlerErrorKind::Forbidden,
            ServiceError::Unauthorized(_) => HandlerErrorKind::Unauthorized,
            ServiceError::DependencyFailure(_) => HandlerErrorKind::DependencyFailure,
            ServiceError::InternalError(_) => HandlerErrorKind::Internal,
        };
        let handler_error = HandlerError::new(kind, err.to_string());
        match err.code() {
            Some(code) => handler_error.with_details(code),
            None => handler_error,
        }
    }
}

/// Failure of a workflow operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Precondition Failed: expected {expected}, found {actual}")]
    PreconditionFailed { expected: String, actual: String },

    /// The compare-and-swap lost a race. Callers should re-fetch and retry.
    #[error("Concurrent Modification: {0}")]
    ConcurrentModification(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Already Converted: estimate {0} has already been converted to a deal")]
    AlreadyConverted(String),

    #[error("Duplicate Lead: {0}")]
    DuplicateLeadWindow(String),

    #[error("Duplicate Submission: {0}")]
    DuplicateSubmission(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Dependency Failure: {0}")]
    DependencyFailure(String),

    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn precondition(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ServiceError::PreconditionFailed {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Stable machine-readable code for conflict kinds that share an HTTP status.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ServiceError::ConcurrentModification(_) => Some("CONCURRENT_MODIFICATION"),
            ServiceError::AlreadyConverted(_) => Some("ALREADY_CONVERTED"),
            ServiceError::DuplicateLeadWindow(_) => Some("DUPLICATE_LEAD_WINDOW"),
            ServiceError::DuplicateSubmission(_) => Some("DUPLICATE_SUBMISSION"),
            _ => None,
        }
    }

    /// Only lost races are worth retrying without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrentModification(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::ValidationError(msg) => ServiceError::Validation(msg),
            RepositoryError::AlreadyExists(msg) => ServiceError::Conflict(msg),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::DatabaseError(msg) => ServiceError::InternalError(msg),
            RepositoryError::ConnectionError(msg) => ServiceError::InternalError(msg),
            RepositoryError::SerializationError(msg) => ServiceError::InternalError(msg),
            RepositoryError::Generic(e) => ServiceError::InternalError(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        if messages.is_empty() {
            messages.push(errors.to_string());
        }
        messages.sort();
        ServiceError::Validation(messages.join("; "))
    }
}
