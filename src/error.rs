//! Error types for driftlock
//!
//! This module provides the error hierarchy used across all components,
//! built with `thiserror`. The taxonomy is deliberately small: fatal
//! configuration and driver-launch failures, the locator's single hard
//! failure mode, and pass-through wrappers. Transient conditions (stale
//! elements, per-selector timeouts, not-yet-interactable nodes) are handled
//! internally by the locator and interaction layers and never surface as
//! distinct variants.

use thiserror::Error;

/// The main error type for driftlock operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing required configuration; fatal to session
    /// creation and never retried.
    #[error("Configuration error for '{key}': {message}")]
    Configuration {
        /// Config key or section that failed validation
        key: String,
        /// What went wrong
        message: String,
    },

    /// The underlying automation driver failed to start (binary missing,
    /// version mismatch, profile lock conflict). Fatal for that session;
    /// the caller may retry with a fresh profile or a different service.
    #[error("Failed to initialize driver for '{service}': {message}")]
    DriverInitialization {
        /// Service the session was being created for
        service: String,
        /// Launch failure detail
        message: String,
    },

    /// Raised only after every candidate selector has been exhausted.
    /// Carries the full attempted list for diagnostics.
    #[error("None of the selectors matched: {selectors:?}")]
    SelectorNotFound {
        /// The complete selector list that was attempted, in order
        selectors: Vec<String>,
    },

    /// ChromiumOxide/CDP errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for driftlock operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Error::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error indicates a stale element handle, i.e. a node
    /// reference invalidated by a DOM mutation. The interaction layer uses
    /// this to re-resolve from the original selector list instead of
    /// failing the operation.
    pub fn is_stale(&self) -> bool {
        match self {
            Error::Cdp(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("node with given id")
                    || msg.contains("no node found")
                    || msg.contains("node id not found")
                    || msg.contains("object id not found")
                    || msg.contains("cannot find context")
                    || msg.contains("detached")
            }
            _ => false,
        }
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
