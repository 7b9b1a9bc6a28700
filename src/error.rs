//! Error types for Rewind

use std::io;
use thiserror::Error;

use crate::request::Request;

/// Result type for Rewind operations
pub type Result<T> = std::result::Result<T, RewindError>;

/// Errors that can occur in Rewind
#[derive(Debug, Error)]
pub enum RewindError {
    /// No policy covers the request: no stored interaction matched and live
    /// traffic is not permitted
    #[error(
        "Unhandled request: {} {}. Real HTTP connections are disabled and no \
         stored interaction matches it",
        .0.method(),
        .0.uri()
    )]
    UnhandledRequest(Box<Request>),

    /// A registered hook failed
    #[error("Hook '{hook}' failed: {message}")]
    Hook {
        /// Name of the hook that failed
        hook: String,
        /// Failure description
        message: String,
    },

    /// Cassettes cannot be used while interception is turned off
    #[error("Interception is turned off; cassettes cannot be inserted")]
    TurnedOff,

    /// Interception cannot be turned off while a cassette is inserted
    #[error("Cassette '{0}' is currently in use")]
    CassetteInUse(String),

    /// Invalid cassette name
    #[error("Invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// Forwarding to the real upstream failed
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Request/response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl RewindError {
    /// Build a hook failure
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// The offending request, if this is an unhandled-request error
    #[must_use]
    pub fn unhandled_request(&self) -> Option<&Request> {
        match self {
            Self::UnhandledRequest(request) => Some(request),
            _ => None,
        }
    }
}
