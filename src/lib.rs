//! DevTools Session - Stateful session layer over a remote debugging connection.
//!
//! This library drives one page through its remote debugging WebSocket
//! endpoint and splits the single connection into independent subsystems.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!                 │              ConnectionManager           │
//!                 │  lazy connect · domains · log buffer     │
//!                 │  listener table                          │
//!                 └───────┬──────────────┬──────────────┬────┘
//!                         │              │              │
//!             ┌───────────┴───┐  ┌───────┴───────┐  ┌───┴────────────┐
//!             │NetworkRecorder│  │ConsoleStream  │  │ OverlayManager │
//!             └───────────────┘  └───────────────┘  └────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One connection per page, opened by whoever needs it first
//! - Per-connection state is reset as a whole when the connection ends
//! - Subsystems depend only on the manager, never on each other
//! - Cleanup never fails the caller; it is logged instead
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_session::{EntryQuery, Inspector, Result, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::new("ws://127.0.0.1:9222/devtools/page/ABC")?;
//!     let (inspector, _console) = Inspector::with_channel(&config);
//!
//!     inspector.start().await?;
//!     inspector.network().start().await?;
//!
//!     let title = inspector.session().evaluate("document.title").await?;
//!     println!("Page title: {}", title.value);
//!
//!     for entry in inspector.session().get_entries(&EntryQuery::default()) {
//!         println!("[{}] {}", entry.level, entry.message);
//!     }
//!
//!     inspector.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Endpoint and timeouts |
//! | [`console`] | Live console streaming |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`inspector`] | Façade over one session |
//! | [`network`] | Request lifecycle recording |
//! | [`overlay`] | Single active highlight |
//! | [`protocol`] | Wire message types |
//! | [`session`] | Connection manager and page commands |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Session configuration.
pub mod config;

/// Console event streaming.
///
/// Use [`ConsoleStreamManager::subscribe`] to start forwarding filtered
/// console output to a [`NotificationSink`].
pub mod console;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Session façade.
pub mod inspector;

/// Network request recording.
pub mod network;

/// Highlight overlay.
pub mod overlay;

/// Remote debugging protocol message types.
pub mod protocol;

/// Connection manager, log buffer and page-level commands.
pub mod session;

/// WebSocket transport layer.
///
/// Defines the [`Transport`](transport::Transport) seam the session runs on.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::SessionConfig;

// Console types
pub use console::{
    ConsoleLevel, ConsoleNotification, ConsoleOptions, ConsoleStreamManager, NotificationSink,
    Severity, SubscribeOptions,
};

// Error types
pub use error::{BestEffort, Error, Result};

// Identifier types
pub use identifiers::{CommandId, NetworkRequestId, NodeId};

// Façade
pub use inspector::Inspector;

// Network types
pub use network::{NetworkRecorder, NetworkRequestRecord, RequestFilter};

// Overlay types
pub use overlay::{HighlightColors, HighlightOptions, HighlightOutcome, OverlayManager, Rgba};

// Session types
pub use session::{
    ConnectionManager, EntryQuery, EvaluationResult, ImageFormat, KeyPress, LogEntry, LogKind,
    Screenshot, ScreenshotOptions,
};
