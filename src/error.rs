//! Error types for image-batch-dl
//!
//! This module provides error handling for the library, including:
//! - Task-local error types (fetch, conversion, write) that end up on a failed item
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for image-batch-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for image-batch-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Fetching an image failed
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// Re-encoding an image failed
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Persisting a file failed
    #[error("{0}")]
    Write(#[from] WriteError),

    /// A request could not be accepted as given
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The scan provider could not produce a candidate list
    #[error("scan failed: {0}")]
    Scan(String),

    /// No download session is currently active
    #[error("no active download session")]
    NoSession,

    /// A page replied to a conversion job that is not pending
    #[error("no pending conversion job {0}")]
    UnknownJob(u64),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised while retrieving image bytes
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("request failed: {status}")]
    HttpStatus {
        /// HTTP status code returned by the server
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// Connection, TLS or body read failure
    #[error("request failed: {reason}")]
    Transport {
        /// URL that was requested
        url: String,
        /// Underlying failure description
        reason: String,
    },

    /// URL could not be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Fetch did not complete within the configured bound
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Errors raised by the format converter
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The execution context hosting the converter is gone
    #[error("converter unreachable: {0}")]
    Unreachable(String),

    /// The converter reported a failure
    #[error("{0}")]
    Failed(String),

    /// Conversion did not complete within the configured bound
    #[error("conversion timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Errors raised by the storage sink
#[derive(Debug, Error)]
pub enum WriteError {
    /// The sink rejected the write
    #[error("write rejected for {path}: {reason}")]
    Rejected {
        /// Relative destination path
        path: String,
        /// Reason given by the sink
        reason: String,
    },

    /// The sink accepted the write but returned no identifier
    #[error("write for {path} reported no identifier")]
    NoIdentifier {
        /// Relative destination path
        path: String,
    },

    /// The staged blob was released before the sink consumed it
    #[error("staged blob {0} is no longer available")]
    BlobReleased(u64),

    /// Write did not complete within the configured bound
    #[error("write timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "no_session",
///     "message": "no active download session"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "scan_failed")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) => 400,

            Error::NoSession => 404,
            Error::UnknownJob(_) => 404,

            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Write(_) => 500,

            // 502 Bad Gateway - the page, network or converter misbehaved
            Error::Scan(_) => 502,
            Error::Fetch(_) => 502,
            Error::Network(_) => 502,
            Error::Conversion(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::Database(_) => "database_error",
            Error::Fetch(e) => match e {
                FetchError::HttpStatus { .. } => "http_status",
                FetchError::Transport { .. } => "transport_error",
                FetchError::InvalidUrl(_) => "invalid_url",
                FetchError::Timeout(_) => "fetch_timeout",
            },
            Error::Conversion(e) => match e {
                ConversionError::Unreachable(_) => "converter_unreachable",
                ConversionError::Failed(_) => "conversion_failed",
                ConversionError::Timeout(_) => "conversion_timeout",
            },
            Error::Write(e) => match e {
                WriteError::Rejected { .. } => "write_rejected",
                WriteError::NoIdentifier { .. } => "write_no_identifier",
                WriteError::BlobReleased(_) => "blob_released",
                WriteError::Timeout(_) => "write_timeout",
            },
            Error::Scan(_) => "scan_failed",
            Error::NoSession => "no_session",
            Error::UnknownJob(_) => "unknown_job",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Fetch(FetchError::HttpStatus { status, url }) => Some(serde_json::json!({
                "status": status,
                "url": url,
            })),
            Error::Fetch(FetchError::Transport { url, .. }) => {
                Some(serde_json::json!({ "url": url }))
            }
            Error::Write(WriteError::Rejected { path, .. })
            | Error::Write(WriteError::NoIdentifier { path }) => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
