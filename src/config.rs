//! Session configuration.
//!
//! Provides a type-safe interface for the endpoint address, timeouts and
//! buffer limits of one session.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use devtools_session::SessionConfig;
//!
//! let config = SessionConfig::new("ws://127.0.0.1:9222/devtools/page/ABC")?
//!     .with_command_timeout(Duration::from_secs(10))
//!     .with_log_capacity(1000);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default command response timeout.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default WebSocket handshake timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default log buffer capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Default cap on commands in flight.
const DEFAULT_MAX_PENDING_COMMANDS: usize = 100;

// ============================================================================
// SessionConfig
// ============================================================================

/// Configuration for one page session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Page-scoped WebSocket endpoint.
    endpoint: Url,

    /// Maximum wait for a command response.
    command_timeout: Duration,

    /// Maximum wait for the WebSocket handshake.
    connect_timeout: Duration,

    /// Log entries retained before the oldest is evicted.
    log_capacity: usize,

    /// Commands allowed in flight at once.
    max_pending_commands: usize,
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration for `endpoint` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `endpoint` is not a `ws://` URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid endpoint '{endpoint}': {e}")))?;

        if endpoint.scheme() != "ws" {
            return Err(Error::config(format!(
                "endpoint must use the ws scheme, got '{}'",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            log_capacity: DEFAULT_LOG_CAPACITY,
            max_pending_commands: DEFAULT_MAX_PENDING_COMMANDS,
        })
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the command response timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the WebSocket handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the log buffer capacity. Zero is raised to one.
    #[inline]
    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }

    /// Sets the cap on commands in flight. Zero is raised to one.
    #[inline]
    #[must_use]
    pub fn with_max_pending_commands(mut self, max: usize) -> Self {
        self.max_pending_commands = max.max(1);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SessionConfig {
    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the command response timeout.
    #[inline]
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the WebSocket handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the log buffer capacity.
    #[inline]
    #[must_use]
    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Returns the cap on commands in flight.
    #[inline]
    #[must_use]
    pub fn max_pending_commands(&self) -> usize {
        self.max_pending_commands
    }
}

// ============================================================================
// Tests
// ============================================================================
