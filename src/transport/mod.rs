//! Transport layer between the session and the page endpoint.
//!
//! The session never touches sockets directly. It asks a [`Connector`] for a
//! [`Transport`], sends commands through it, and receives unsolicited traffic
//! through the [`EventSink`] it handed to the connector.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌──────────────────┐
//! │  ConnectionManager   │                        │  Page endpoint   │
//! │                      │       WebSocket        │  (one document)  │
//! │  Connector           │───────────────────────►│                  │
//! │  → Transport (call)  │◄──── responses ────────│                  │
//! │  ← EventSink         │◄──── events ───────────│                  │
//! └──────────────────────┘                        └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connector::connect` - open the socket, spawn the event loop
//! 2. `Transport::call` - correlated command round trips
//! 3. `EventSink::on_event` - events in arrival order
//! 4. `EventSink::on_disconnect` - once, when the socket ends
//! 5. `Transport::close` - local shutdown
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::protocol::Event;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionOptions};

// ============================================================================
// Traits
// ============================================================================

/// An established, bidirectional channel to one page endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `method` with `params` and waits for the correlated result.
    ///
    /// # Errors
    ///
    /// Returns a connection-category error if the command could not be
    /// delivered, timed out, or the endpoint answered with a protocol error.
    async fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// Closes the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel was already gone.
    async fn close(&self) -> Result<()>;
}

/// Receives unsolicited traffic from a [`Transport`].
///
/// Called from the transport's event loop, one message at a time, in the
/// order messages arrived. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: Event);

    /// Handles the end of the connection. Called at most once.
    fn on_disconnect(&self);
}

/// Establishes transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new transport that reports traffic to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a connection-category error if the endpoint is unreachable.
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>>;
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Connects to a page-scoped WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    options: ConnectionOptions,
}

impl WebSocketConnector {
    /// Creates a connector for the endpoint in `config`.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            endpoint: config.endpoint().to_string(),
            options: ConnectionOptions::from(config),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>> {
        debug!(endpoint = %self.endpoint, "Connecting to page endpoint");
        let connection = Connection::connect(&self.endpoint, self.options.clone(), sink).await?;
        Ok(Arc::new(connection))
    }
}
