//! Error types for the Parley SDK
//!
//! All failures surface through a single `thiserror` enum so callers can
//! branch on the kind of rejection (rate limited, unauthenticated, ...)
//! without downcasting through an opaque error type.

use thiserror::Error;

/// Main error type for Parley operations
///
/// Remote rejections are mapped from the HTTP status class so that each
/// class is a distinct variant. Transport failures keep the underlying
/// `reqwest` error untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing client configuration (detected before any network activity)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connectivity failure or timeout at the HTTP layer
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 401 Unauthorized
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 403 Forbidden
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// 404 Not Found
    #[error("Not found: {0}")]
    NotFound(String),

    /// 409 Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 422 Unprocessable Entity
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// 429 Too Many Requests
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Any other error status, including 5xx
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// A local conversation lookup failed
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Caller passed an invalid argument (bad page size, unknown export format, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code associated with this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::BadRequest(_) => Some(400),
            Error::Authentication(_) => Some(401),
            Error::PermissionDenied(_) => Some(403),
            Error::NotFound(_) => Some(404),
            Error::Conflict(_) => Some(409),
            Error::UnprocessableEntity(_) => Some(422),
            Error::RateLimit(_) => Some(429),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Map an HTTP error status and message to the matching error variant
pub(crate) fn status_error(status: u16, message: impl Into<String>) -> Error {
    let message = message.into();
    match status {
        400 => Error::BadRequest(message),
        401 => Error::Authentication(message),
        403 => Error::PermissionDenied(message),
        404 => Error::NotFound(message),
        409 => Error::Conflict(message),
        422 => Error::UnprocessableEntity(message),
        429 => Error::RateLimit(message),
        _ => Error::Api { status, message },
    }
}

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;
