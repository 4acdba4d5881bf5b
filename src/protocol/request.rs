//! Request and Response message types.
//!
//! Defines the frame format for commands sent to the page endpoint and the
//! correlated responses coming back.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to the page endpoint.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Domain.methodName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Identifier for request/response correlation.
    pub id: CommandId,

    /// Method in `Domain.methodName` format.
    pub method: String,

    /// Method parameters; always an object on the wire.
    pub params: Value,
}

impl Request {
    /// Creates a new request. `null` params are sent as `{}`.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the page endpoint.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "...", "data": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: CommandId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if error).
    #[serde(default)]
    pub error: Option<ProtocolError>,
}

/// Error payload of a failed command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProtocolError {
    /// JSON-RPC style error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Optional extra detail. Usually a string, but any JSON is accepted.
    #[serde(default)]
    pub data: Option<Value>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] carrying the protocol message.
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Object(Map::new()))),
            Some(error) => {
                let message = match error.data {
                    Some(Value::String(data)) if !data.is_empty() => {
                        format!("{}: {}", error.message, data)
                    }
                    Some(Value::Null | Value::String(_)) | None => error.message,
                    Some(data) => format!("{}: {}", error.message, data),
                };
                Err(Error::command(method, error.code, message))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
