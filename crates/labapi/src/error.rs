//! Error types for API client operations.
//!
//! Failures are classified by HTTP status so the reconciliation core can
//! tell "the object is gone" apart from "the remote refused the request".

use reconcile::{CallError, RemoteFailure};

/// Result type alias for API client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the remote API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message, from the response body when there is one.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// A 404 with the message the remote uses for a missing object.
    pub fn not_found(what: &str) -> Self {
        Self::http(format!("404 {what} Not Found"), Some(404))
    }

    /// A 4xx refusal.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::http(message, Some(status))
    }

    /// HTTP status code, if the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the remote reported the object as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for RemoteFailure {
    fn from(err: Error) -> Self {
        let status = err.status();
        let message = match err {
            Error::HttpError { message, .. } => message,
            other => other.to_string(),
        };
        Self::new(status, message)
    }
}

impl From<Error> for CallError {
    fn from(err: Error) -> Self {
        Self::Remote(err.into())
    }
}
