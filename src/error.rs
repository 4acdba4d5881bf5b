//! Error types for the session layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use devtools_session::{ConnectionManager, Result};
//!
//! async fn title(manager: &ConnectionManager) -> Result<String> {
//!     let result = manager.evaluate("document.title").await?;
//!     Ok(result.value)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::ConnectionTimeout`], [`Error::RequestTimeout`], [`Error::Command`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidArgument`] |
//! | Page | [`Error::Evaluation`], [`Error::NotFound`], [`Error::Navigation`] |
//! | Execution | [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! Cleanup paths (overlay restore, listener detachment, highlight hide) never
//! surface errors; they go through [`BestEffort::best_effort`] instead.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::debug;

use crate::identifiers::CommandId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established or a command could not be sent.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Endpoint did not accept the connection in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// No response arrived for a command in time.
    #[error("Command {command_id} ({method}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The command that timed out.
        command_id: CommandId,
        /// Protocol method of the command.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Remote end answered a command with a protocol error.
    #[error("{method} failed: {message} (code {code})")]
    Command {
        /// Protocol method of the command.
        method: String,
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unexpected traffic.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Operation was called with unusable arguments.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Page Errors
    // ========================================================================
    /// Expression threw inside the page.
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Composed exception message, with location suffix when known.
        message: String,
    },

    /// Selector, node or focused element could not be resolved.
    #[error("Not found: {what}")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// Navigation was rejected by the page.
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Error text reported by the page agent.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(command_id: CommandId, method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            command_id,
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a remote command error.
    #[inline]
    pub fn command(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Command {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an evaluation error.
    #[inline]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[inline]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a navigation error.
    #[inline]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Timeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if command dispatch or connection establishment failed.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::Command { .. }
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if a lookup failed.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// BestEffort
// ============================================================================

/// Turns a fallible cleanup step into a discardable outcome.
///
/// The error is logged at `debug` and dropped, so cleanup never blocks
/// forward progress but stays visible in traces.
pub trait BestEffort<T> {
    /// Logs the error under `what` and returns the success value, if any.
    fn best_effort(self, what: &str) -> Option<T>;
}

impl<T> BestEffort<T> for Result<T> {
    fn best_effort(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(operation = what, error = %e, "Best-effort step failed");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
