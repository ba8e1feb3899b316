//! Error types for the table API client.
//!
//! # Design
//! Every failure the client can report is a variant of [`ApiError`], so
//! callers branch on the kind rather than on message text. A server message
//! carrying the `"Data Error: "` prefix becomes [`ApiError::DataValidation`]
//! instead of [`ApiError::Remote`]; both count as remote errors for
//! [`ApiError::is_remote`].

use std::path::PathBuf;
use std::time::Duration;

use serde_json::error::Category;
use thiserror::Error;

/// Errors returned by `TableClient` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The credential file does not exist.
    #[error("file not found: {}", path.display())]
    CredentialNotFound { path: PathBuf },

    /// The credential file exists but holds no usable PEM certificate.
    #[error("certificate {} is not a valid PEM X509 certificate: {reason}", path.display())]
    InvalidCredential { path: PathBuf, reason: String },

    /// The credential file could not be read for a reason other than absence.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No response was obtained from the server.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body is not JSON.
    #[error("JSON error ({category:?} at {line}:{column}): {message}; plaintext response was: {plaintext}")]
    MalformedResponse {
        category: Category,
        line: usize,
        column: usize,
        message: String,
        plaintext: String,
    },

    /// The server reported an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// The server rejected the data (duplicate key, constraint violation...).
    /// The `"Data Error: "` prefix is already stripped.
    #[error("data error: {0}")]
    DataValidation(String),

    #[error("login failed")]
    LoginFailed,

    /// The action name or its arguments do not map onto a request.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn malformed(err: &serde_json::Error, plaintext: &str) -> Self {
        ApiError::MalformedResponse {
            category: err.classify(),
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
            plaintext: plaintext.to_string(),
        }
    }

    pub(crate) fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ApiError::Transport(err.into())
    }

    /// Variant name, for logs that must not carry payloads or server text.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::CredentialNotFound { .. } => "CredentialNotFound",
            ApiError::InvalidCredential { .. } => "InvalidCredential",
            ApiError::Io { .. } => "Io",
            ApiError::Transport(_) => "Transport",
            ApiError::MalformedResponse { .. } => "MalformedResponse",
            ApiError::Remote(_) => "Remote",
            ApiError::DataValidation(_) => "DataValidation",
            ApiError::LoginFailed => "LoginFailed",
            ApiError::UnsupportedOperation(_) => "UnsupportedOperation",
            ApiError::RateLimited { .. } => "RateLimited",
            ApiError::Serialization(_) => "Serialization",
        }
    }

    /// True for errors reported by the server in the response envelope.
    pub fn is_remote(&self) -> bool {
        matches!(self, ApiError::Remote(_) | ApiError::DataValidation(_))
    }

    /// How long the server asked the caller to wait, if rate limited.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
