//! Remote debugging protocol message types.
//!
//! This module defines the frames exchanged with the page endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Correlated command response |
//! | `Event` | Remote → Local | Unsolicited domain notification |
//!
//! # Command Naming
//!
//! Commands and events follow `Domain.methodName` format:
//!
//! - `Runtime.evaluate`
//! - `DOM.querySelector`
//! - `Network.loadingFinished`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed command definitions by domain |
//! | `event` | Event frame and typed event params |
//! | `request` | Request and Response frames |
//! | `types` | Payload types shared by results and events |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

/// Shared payload types.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    AccessibilityCommand, CallArgument, Command, DomCommand, InputCommand, NetworkCommand,
    OverlayCommand, PageCommand, RuntimeCommand,
};
pub use event::{Event, ParsedEvent, methods};
pub use request::{ProtocolError, Request, Response};
pub use types::{
    CallFrame, EvaluateResult, ExceptionDetails, RemoteObject, RequestPayload, ResponseBody,
    ResponsePayload, StackTrace,
};
