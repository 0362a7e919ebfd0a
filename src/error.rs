//! Error types
//!
//! A single error enum covers lookup failures (not found, ambiguous),
//! caller mistakes (invalid argument, unsupported operation) and everything
//! that can go wrong talking to the Google APIs.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the library
#[derive(Debug, Error)]
pub enum Error {
    /// No match for a name, path component or resource id
    #[error("{what} not found{}", available_suffix(.available))]
    NotFound {
        what: String,
        /// Names the caller could have meant (sibling folders, etc.)
        available: Vec<String>,
    },

    /// Several plausible matches; always carries the candidates
    #[error("'{query}' is ambiguous, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is structurally impossible for this resource
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A backing table or service could not be reached
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// The API answered with a non-success status
    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Auth(#[from] gcp_auth::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation {operation} timed out after {}s", .elapsed.as_secs())]
    Timeout { operation: String, elapsed: Duration },

    #[error("operation {operation} failed with code {code}: {message}")]
    OperationFailed {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

fn available_suffix(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(", available: {}", available.join(", "))
    }
}

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            available: Vec::new(),
        }
    }

    /// True for lookups that came back empty, including API 404s.
    ///
    /// Resource Manager answers 403 instead of 404 for projects the caller
    /// cannot see, so callers probing for existence should treat both alike.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Api { status: 403 | 404, .. }
        )
    }

    /// HTTP status of an API failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
