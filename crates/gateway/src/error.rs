//! API error type and its stable wire codes.
//!
//! Handlers return [`ApiError`]; [`RequestContext::failure`] turns it into
//! the error envelope, with the message replaced by a fixed sanitized text
//! in production mode.
//!
//! [`RequestContext::failure`]: crate::api::context::RequestContext::failure

use std::fmt;

use ag_authz::GateError;
use ag_ingest::IngestError;
use axum::http::StatusCode;

use crate::runtime::executor::ExecutorError;
use crate::runtime::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    Forbidden,
    PayloadTooLarge,
    UnreadableStream,
    Graph,
    Store,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::UnreadableStream => "UNREADABLE_STREAM",
            ErrorCode::Graph => "GRAPH_ERROR",
            ErrorCode::Store => "STORE_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnreadableStream => StatusCode::BAD_REQUEST,
            ErrorCode::Graph | ErrorCode::Store => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-safe text for a wire code. Unknown codes get a generic answer.
pub fn sanitized_message(code: &str) -> &'static str {
    match code {
        "VALIDATION_ERROR" => "The request data is invalid. Please check your input.",
        "UNAUTHORIZED" => "Authentication is required to access this resource.",
        "FORBIDDEN" => "You do not have permission to perform this action.",
        "PAYLOAD_TOO_LARGE" => "The uploaded content exceeds the allowed size.",
        "UNREADABLE_STREAM" => "An uploaded file could not be read.",
        "GRAPH_ERROR" => "An error occurred executing the graph.",
        "STORE_ERROR" => "An error occurred accessing the memory store.",
        "INTERNAL_ERROR" => "An internal error occurred.",
        _ => "An unexpected error occurred. Please contact support.",
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnreadableStream, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let code = match e {
            IngestError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            IngestError::UnreadableStream { .. } => ErrorCode::UnreadableStream,
        };
        Self::new(code, e.to_string())
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Forbidden { .. } => Self::new(ErrorCode::Forbidden, e.to_string()),
            GateError::Internal(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<ExecutorError> for ApiError {
    fn from(e: ExecutorError) -> Self {
        Self::new(ErrorCode::Graph, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::new(ErrorCode::Store, e.to_string())
    }
}
