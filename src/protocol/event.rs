//! Event message types.
//!
//! Events are unsolicited notifications pushed by the page endpoint once the
//! matching domain is enabled.
//!
//! # Consumed Events
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown` |
//! | `Log` | `entryAdded` |
//! | `Network` | `requestWillBeSent`, `responseReceived`, `loadingFinished`, `loadingFailed` |
//! | `Page` | `loadEventFired` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::NetworkRequestId;

use super::types::{ExceptionDetails, RemoteObject, RequestPayload, ResponsePayload, StackTrace};

// ============================================================================
// Method Names
// ============================================================================

/// Event method names.
pub mod methods {
    /// `console.*` call in the page.
    pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";
    /// Uncaught exception in the page.
    pub const EXCEPTION_THROWN: &str = "Runtime.exceptionThrown";
    /// Browser-side log entry (interventions, violations, network errors).
    pub const LOG_ENTRY_ADDED: &str = "Log.entryAdded";
    /// Request about to be sent.
    pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
    /// Response headers received.
    pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
    /// Request completed.
    pub const LOADING_FINISHED: &str = "Network.loadingFinished";
    /// Request failed.
    pub const LOADING_FAILED: &str = "Network.loadingFailed";
    /// Page `load` event.
    pub const LOAD_EVENT_FIRED: &str = "Page.loadEventFired";
}

// ============================================================================
// Event
// ============================================================================

/// An event notification from the page endpoint.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session the event belongs to, for flattened multi-session endpoints.
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

impl Event {
    /// Creates an event from parts.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Network.loadingFinished", json!({}));
    /// assert_eq!(event.domain(), "Network");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Deserializes params into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if params do not match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.params)?)
    }

    /// Parses the event into a typed variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if a known event carries
    /// malformed params. Unknown events never fail.
    pub fn parse(&self) -> Result<ParsedEvent> {
        let parsed = match self.method.as_str() {
            methods::CONSOLE_API_CALLED => ParsedEvent::ConsoleApiCalled(self.params_as()?),
            methods::EXCEPTION_THROWN => ParsedEvent::ExceptionThrown(self.params_as()?),
            methods::LOG_ENTRY_ADDED => ParsedEvent::LogEntryAdded(self.params_as()?),
            methods::REQUEST_WILL_BE_SENT => ParsedEvent::RequestWillBeSent(self.params_as()?),
            methods::RESPONSE_RECEIVED => ParsedEvent::ResponseReceived(self.params_as()?),
            methods::LOADING_FINISHED => ParsedEvent::LoadingFinished(self.params_as()?),
            methods::LOADING_FAILED => ParsedEvent::LoadingFailed(self.params_as()?),
            methods::LOAD_EVENT_FIRED => ParsedEvent::LoadEventFired {
                timestamp: self.params.get("timestamp").and_then(Value::as_f64),
            },
            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
            },
        };
        Ok(parsed)
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// `console.*` call.
    ConsoleApiCalled(ConsoleApiCalled),
    /// Uncaught exception.
    ExceptionThrown(ExceptionThrown),
    /// Browser log entry.
    LogEntryAdded(LogEntryAdded),
    /// Request about to be sent.
    RequestWillBeSent(RequestWillBeSent),
    /// Response headers received.
    ResponseReceived(ResponseReceived),
    /// Request completed.
    LoadingFinished(LoadingFinished),
    /// Request failed.
    LoadingFailed(LoadingFailed),
    /// Page `load` fired.
    LoadEventFired {
        /// Monotonic timestamp in seconds.
        timestamp: Option<f64>,
    },
    /// Event the session layer does not interpret.
    Unknown {
        /// Event method.
        method: String,
    },
}

// ============================================================================
// Runtime Events
// ============================================================================

/// Params of `Runtime.consoleAPICalled`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalled {
    /// Call category (`log`, `warning`, `error`, `assert`, `table`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Call arguments.
    #[serde(default)]
    pub args: Vec<RemoteObject>,

    /// Call timestamp.
    #[serde(default)]
    pub timestamp: f64,

    /// Stack at call time.
    #[serde(default)]
    pub stack_trace: Option<StackTrace>,
}

/// Params of `Runtime.exceptionThrown`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrown {
    /// Throw timestamp.
    #[serde(default)]
    pub timestamp: f64,

    /// Exception details.
    pub exception_details: ExceptionDetails,
}

// ============================================================================
// Log Events
// ============================================================================

/// Params of `Log.entryAdded`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntryAdded {
    /// The entry.
    pub entry: BrowserLogEntry,
}

/// Browser-side log entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserLogEntry {
    /// Origin (`network`, `violation`, `intervention`, ...).
    #[serde(default)]
    pub source: String,

    /// Level (`verbose`, `info`, `warning`, `error`).
    #[serde(default)]
    pub level: String,

    /// Entry text.
    #[serde(default)]
    pub text: String,

    /// Entry timestamp.
    #[serde(default)]
    pub timestamp: f64,

    /// Related URL.
    #[serde(default)]
    pub url: Option<String>,
}

// ============================================================================
// Network Events
// ============================================================================

/// Params of `Network.requestWillBeSent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    /// Request id.
    pub request_id: NetworkRequestId,

    /// Request data.
    pub request: RequestPayload,

    /// Monotonic timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// Wall-clock timestamp in seconds since epoch.
    #[serde(default)]
    pub wall_time: Option<f64>,

    /// Resource type (`Document`, `XHR`, `Fetch`, ...).
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,

    /// Present when this event continues a redirect chain.
    #[serde(default)]
    pub redirect_response: Option<ResponsePayload>,
}

/// Params of `Network.responseReceived`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    /// Request id.
    pub request_id: NetworkRequestId,

    /// Monotonic timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// Resource type.
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,

    /// Response data.
    pub response: ResponsePayload,
}

/// Params of `Network.loadingFinished`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    /// Request id.
    pub request_id: NetworkRequestId,

    /// Monotonic timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// Total bytes received.
    #[serde(default)]
    pub encoded_data_length: Option<f64>,
}

/// Params of `Network.loadingFailed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
    /// Request id.
    pub request_id: NetworkRequestId,

    /// Monotonic timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// Resource type.
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,

    /// Failure text (`net::ERR_FAILED`, ...).
    #[serde(default)]
    pub error_text: String,

    /// Whether the load was canceled.
    #[serde(default)]
    pub canceled: Option<bool>,

    /// Why the request was blocked, if it was.
    #[serde(default)]
    pub blocked_reason: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
