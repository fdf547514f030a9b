//! Error types for the Ferry request core.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// All possible errors from the request core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Input validation errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request is already executing")]
    AlreadyExecuting,

    // Store / backend errors
    #[error("not found: {0}")]
    NotFound(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("no response was produced")]
    NoResponse,

    #[error("{message}")]
    Api {
        /// Error name reported by the backend, if any
        name: Option<String>,
        /// HTTP status code of the failed response
        status_code: u16,
        /// Human-readable message from the error envelope
        message: String,
        /// Backend debug detail, if any
        debug: Option<String>,
    },

    // Infrastructure errors
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type for request-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Server error envelope carried in the body of a failed response.
///
/// Backends are inconsistent about which field holds the message, so all
/// three spellings are accepted and unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    /// Error name, e.g. `EntityNotFound` or `BlobNotFound`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Backend-internal debug detail
    #[serde(default)]
    pub debug: Option<String>,
}

impl ErrorEnvelope {
    /// Parse an envelope out of a response body, tolerating any shape.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// The best available message, preferring `message` over `description`
    /// over `error`.
    pub fn best_message(&self) -> &str {
        self.message
            .as_deref()
            .or(self.description.as_deref())
            .or(self.error.as_deref())
            .unwrap_or("an unknown error occurred")
    }
}
