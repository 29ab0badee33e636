//! Application error taxonomy.
//!
//! Every domain failure in the platform is an [`AppError`]: a message, a
//! closed [`ErrorKind`] fixing the HTTP status code, and a structured
//! details map. The boundary layer renders it through [`AppError::to_dict`]
//! or the [`IntoResponse`] impl without inspecting call stacks.
//!
//! Errors are logged at construction time, in the factory itself, so a
//! failure is recorded even when the caller discards the value.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

/// Structured details attached to an error, rendered verbatim in the
/// response body.
pub type JsonMap = serde_json::Map<String, Value>;

/// The closed set of domain error categories.
///
/// Each kind carries a fixed HTTP status code; classification happens by
/// kind, not by wrapping additional logic around the error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Client input failed validation.
    Validation,
    /// The caller could not be authenticated.
    Authentication,
    /// The caller is authenticated but not allowed.
    Authorization,
    /// The requested resource does not exist.
    NotFound,
    /// An LLM provider call failed; treated as transient by callers.
    Llm,
    /// Document processing failed; not retriable.
    DocumentProcessing,
    /// A database operation failed; treated as transient by callers.
    Database,
    /// An object-storage operation failed; treated as transient by callers.
    Storage,
}

impl ErrorKind {
    /// The kind name used in serialized error bodies.
    pub fn name(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Authentication => "AuthenticationError",
            Self::Authorization => "AuthorizationError",
            Self::NotFound => "NotFoundError",
            Self::Llm => "LLMError",
            Self::DocumentProcessing => "DocumentProcessingError",
            Self::Database => "DatabaseError",
            Self::Storage => "StorageError",
        }
    }

    /// The HTTP status code this kind maps to.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Llm => StatusCode::SERVICE_UNAVAILABLE,
            Self::DocumentProcessing => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A domain failure carrying its HTTP mapping and structured details.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The error category; fixes the HTTP status code.
    pub kind: ErrorKind,
    /// Human-readable description, safe to expose to clients.
    pub message: String,
    /// Structured context rendered in the response body. Nothing outside
    /// this map is ever exposed.
    pub details: JsonMap,
}

impl AppError {
    /// The error factory. Logs the failure at `error` severity before
    /// returning it, tagging the kind name and the details map.
    pub fn new(kind: ErrorKind, message: impl Into<String>, details: JsonMap) -> Self {
        let message = message.into();
        let details_value = Value::Object(details.clone());
        tracing::error!(
            kind = kind.name(),
            details = %details_value,
            "{message}"
        );
        Self {
            kind,
            message,
            details,
        }
    }

    /// A validation failure (HTTP 400).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, JsonMap::new())
    }

    /// An authentication failure (HTTP 401).
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message, JsonMap::new())
    }

    /// An authorization failure (HTTP 403).
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message, JsonMap::new())
    }

    /// A missing-resource failure (HTTP 404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, JsonMap::new())
    }

    /// An LLM provider failure (HTTP 503).
    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Llm, message, JsonMap::new())
    }

    /// A document-processing failure (HTTP 500).
    pub fn document_processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DocumentProcessing, message, JsonMap::new())
    }

    /// A database failure (HTTP 503).
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message, JsonMap::new())
    }

    /// An object-storage failure (HTTP 503).
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message, JsonMap::new())
    }

    /// The HTTP status code carried by this error.
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Serializes the error for an API response body.
    ///
    /// The output always holds exactly the keys `error`, `message`, and
    /// `details`, with `error` set to the kind name.
    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "error": self.kind.name(),
            "message": self.message,
            "details": Value::Object(self.details.clone()),
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.to_dict())).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}
