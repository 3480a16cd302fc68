//! Storage and route error types.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Result type for route pipelines.
pub type RouteResult<T> = std::result::Result<T, RouteError>;

/// Errors reported by an object store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object does not exist.
    #[error("Object not found: {bucket}/{key}")]
    NotFound {
        /// Bucket that was queried.
        bucket: String,
        /// Key that was queried.
        key: String,
    },

    /// Backend answered with a failing HTTP status.
    #[error("Storage error ({status}): {message}")]
    Status {
        /// HTTP status reported by the backend.
        status: u16,
        /// Backend message.
        message: String,
    },

    /// Network error talking to the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Backend misconfiguration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while streaming.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a not found error.
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
            || matches!(self, Self::Status { status: 404, .. })
    }

    /// Convert to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Status { status, .. } => *status,
            Self::Network(_) => 502,
            Self::Config(_) | Self::Io(_) => 500,
        }
    }
}

/// Errors surfaced by the GET, POST and DELETE pipelines.
///
/// Every variant carries an HTTP status, so a response delegate can always
/// turn it into a reply.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Bucket or key could not be resolved.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Object absent.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// Object already exists on upload.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-multipart upload or disallowed part content type.
    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    /// Upload without a content type header.
    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    /// Upload exceeded the configured limits.
    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// Malformed multipart payload.
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// Pass-through of a backend failure.
    #[error("Storage error ({status}): {message}")]
    Storage {
        /// Backend status.
        status: u16,
        /// Backend message.
        message: String,
    },
}

impl RouteError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Bare message without the status prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::UnsupportedMediaType(m)
            | Self::UnprocessableEntity(m)
            | Self::PayloadTooLarge(m)
            | Self::BadRequest(m) => m,
            Self::Storage { message, .. } => message,
        }
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// Structured body used by the default reply strategy.
    pub fn to_body(&self) -> ErrorBody {
        let status = self.status_code();
        ErrorBody {
            status_code: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            message: self.message().to_string(),
        }
    }
}

impl From<StorageError> for RouteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { bucket, key } => {
                Self::NotFound(format!("{}/{}", bucket, key))
            }
            StorageError::Status { status: 404, message } => Self::NotFound(message),
            other => Self::Storage {
                status: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<multer::Error> for RouteError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::FieldSizeExceeded { .. } | multer::Error::StreamSizeExceeded { .. } => {
                Self::PayloadTooLarge(err.to_string())
            }
            multer::Error::NoBoundary | multer::Error::NoMultipart => {
                Self::UnsupportedMediaType(err.to_string())
            }
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

/// JSON error body emitted by the default reply strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// HTTP status code.
    pub status_code: u16,
    /// Canonical reason phrase.
    pub error: String,
    /// Human readable message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let err: RouteError = StorageError::not_found("media", "a.pdf").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.is_not_found());
        assert_eq!(err.message(), "media/a.pdf");
    }

    #[test]
    fn test_storage_status_passthrough() {
        let err: RouteError = StorageError::status(403, "AccessDenied").into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_network_error_is_bad_gateway() {
        let err: RouteError = StorageError::Network("connection reset".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_body() {
        let body = RouteError::Conflict("media/a.pdf already exists".into()).to_body();
        assert_eq!(body.status_code, 409);
        assert_eq!(body.error, "Conflict");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["statusCode"], 409);
    }
}
