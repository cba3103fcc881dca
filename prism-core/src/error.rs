//! Error taxonomy shared by every Prism operation.
//!
//! Each variant maps to one failure class a caller can act on: fix the
//! configuration, re-authenticate, correct the schema, or inspect the server
//! response. Nothing in this crate retries on its own.

use std::path::PathBuf;

/// Result alias used across `prism_core`.
pub type Result<T> = std::result::Result<T, PrismError>;

#[derive(Debug, thiserror::Error)]
pub enum PrismError {
    /// Missing or invalid setting. Raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The OAuth token endpoint rejected the refresh-token exchange or could not be reached.
    #[error("authentication failed{}: {message}", fmt_status(.status))]
    Auth { status: Option<u16>, message: String },

    /// Malformed schema or field input, or an operation-key check that failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Non-2xx response (or transport failure) from a table or bucket endpoint.
    #[error("API request failed{}: {message}", fmt_status(.status))]
    Api { status: Option<u16>, message: String },

    /// A lookup by name matched nothing on the server.
    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },

    /// A local file that cannot be uploaded.
    #[error("cannot upload {}: {reason}", .path.display())]
    InvalidFile { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl PrismError {
    pub fn config(msg: impl Into<String>) -> Self {
        PrismError::Config(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        PrismError::Schema(msg.into())
    }

    /// HTTP status carried by an auth or API failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            PrismError::Auth { status, .. } | PrismError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PrismError {
    fn from(e: reqwest::Error) -> Self {
        PrismError::Api {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for PrismError {
    fn from(e: serde_json::Error) -> Self {
        PrismError::Api {
            status: None,
            message: format!("unexpected response body: {e}"),
        }
    }
}
