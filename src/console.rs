//! Console streaming.
//!
//! A [`ConsoleStreamManager`] turns page console calls and uncaught
//! exceptions into leveled [`ConsoleNotification`]s and pushes them to a
//! [`NotificationSink`] as they arrive.
//!
//! # Levels
//!
//! Console call types are bucketed twice, once for filtering and once for
//! the severity carried outward:
//!
//! | Call type | Filter level | Severity |
//! |-----------|--------------|----------|
//! | `error`, `assert` | `error` | `error` |
//! | `warning` | `warn` | `warning` |
//! | `debug` | `debug` | `debug` |
//! | `info` | `info` | `info` |
//! | anything else (`log`, `table`, `trace`, `group`, ...) | `log` | `info` |
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let console = ConsoleStreamManager::new(&manager, Arc::new(tx));
//!
//! console
//!     .subscribe(SubscribeOptions::default().levels([ConsoleLevel::Warn, ConsoleLevel::Error]))
//!     .await?;
//!
//! while let Some(notification) = rx.recv().await {
//!     println!("[{}] {}", notification.level.as_str(), notification.text);
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{Event, ParsedEvent, StackTrace, methods};
use crate::session::{ConnectionManager, normalize_timestamp, render_value};

// ============================================================================
// Constants
// ============================================================================

/// Listener key for both console handlers.
const LISTENER_KEY: &str = "console-stream";

// ============================================================================
// ConsoleLevel
// ============================================================================

/// Filter bucket of a console call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// Generic output.
    Log,
    /// Debug output.
    Debug,
    /// Informational output.
    Info,
    /// Warnings.
    Warn,
    /// Errors and failed assertions.
    Error,
}

impl ConsoleLevel {
    /// Every level.
    pub const ALL: [Self; 5] = [Self::Log, Self::Debug, Self::Info, Self::Warn, Self::Error];

    /// Buckets a `Runtime.consoleAPICalled` call type.
    #[must_use]
    pub fn from_call_type(call_type: &str) -> Self {
        match call_type {
            "error" | "assert" => Self::Error,
            "warning" | "warn" => Self::Warn,
            "debug" => Self::Debug,
            "info" => Self::Info,
            _ => Self::Log,
        }
    }

    /// Returns the outward severity.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Error => Severity::Error,
            Self::Warn => Severity::Warning,
            Self::Debug => Severity::Debug,
            Self::Info | Self::Log => Severity::Info,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Severity carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

impl Severity {
    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Subscription request. Unset fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Levels to deliver; default all.
    pub levels: Option<Vec<ConsoleLevel>>,
    /// Deliver uncaught exceptions; default `true`.
    pub include_exceptions: Option<bool>,
    /// Attach rendered stack traces; default `false`.
    pub include_stack: Option<bool>,
}

impl SubscribeOptions {
    /// Sets the levels to deliver.
    #[must_use]
    pub fn levels(mut self, levels: impl IntoIterator<Item = ConsoleLevel>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    /// Sets exception delivery.
    #[inline]
    #[must_use]
    pub fn include_exceptions(mut self, enabled: bool) -> Self {
        self.include_exceptions = Some(enabled);
        self
    }

    /// Sets stack trace attachment.
    #[inline]
    #[must_use]
    pub fn include_stack(mut self, enabled: bool) -> Self {
        self.include_stack = Some(enabled);
        self
    }

    /// Applies defaults.
    #[must_use]
    pub fn normalize(self) -> ConsoleOptions {
        let mut levels = self.levels.unwrap_or_else(|| ConsoleLevel::ALL.to_vec());
        levels.sort_unstable();
        levels.dedup();

        ConsoleOptions {
            levels,
            include_exceptions: self.include_exceptions.unwrap_or(true),
            include_stack: self.include_stack.unwrap_or(false),
        }
    }
}

/// Options of an active subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleOptions {
    /// Delivered levels, sorted.
    pub levels: Vec<ConsoleLevel>,
    /// Uncaught exceptions are delivered.
    pub include_exceptions: bool,
    /// Stack traces are attached.
    pub include_stack: bool,
}

impl ConsoleOptions {
    /// Returns `true` if `level` is delivered.
    #[inline]
    #[must_use]
    pub fn accepts(&self, level: ConsoleLevel) -> bool {
        self.levels.contains(&level)
    }
}

// ============================================================================
// ConsoleNotification
// ============================================================================

/// One console message or exception, ready to forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleNotification {
    /// Outward severity.
    pub level: Severity,
    /// `console` or `exception`.
    pub logger: String,
    /// Message text.
    pub text: String,
    /// Console call type, or `exception`.
    pub source: String,
    /// Script URL of the top frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Zero-based line of the top frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    /// Zero-based column of the top frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    /// Rendered stack, when requested and available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Milliseconds.
    pub timestamp: f64,
}

impl ConsoleNotification {
    /// Builds the notification for `event` under `options`.
    ///
    /// Returns `None` for events the options filter out and for events that
    /// are not console calls or exceptions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the event params are malformed.
    pub fn from_event(event: &Event, options: &ConsoleOptions) -> Result<Option<Self>> {
        let notification = match event.parse()? {
            ParsedEvent::ConsoleApiCalled(call) => {
                let level = ConsoleLevel::from_call_type(&call.kind);
                if !options.accepts(level) {
                    return Ok(None);
                }

                let text = call
                    .args
                    .iter()
                    .map(render_value)
                    .collect::<Vec<_>>()
                    .join(" ");
                let top = call.stack_trace.as_ref().and_then(|t| t.call_frames.first());

                Self {
                    level: level.severity(),
                    logger: "console".to_string(),
                    text,
                    source: call.kind.clone(),
                    url: top.map(|f| f.url.clone()).filter(|u| !u.is_empty()),
                    line: top.map(|f| f.line_number),
                    column: top.map(|f| f.column_number),
                    stack: stack_of(call.stack_trace.as_ref(), options),
                    timestamp: normalize_timestamp(call.timestamp),
                }
            }

            ParsedEvent::ExceptionThrown(thrown) => {
                if !options.include_exceptions {
                    return Ok(None);
                }
                let details = &thrown.exception_details;

                Self {
                    level: Severity::Error,
                    logger: "exception".to_string(),
                    text: details.message(),
                    source: "exception".to_string(),
                    url: details.url.clone().filter(|u| !u.is_empty()),
                    line: details.line_number,
                    column: details.column_number,
                    stack: stack_of(details.stack_trace.as_ref(), options),
                    timestamp: normalize_timestamp(thrown.timestamp),
                }
            }

            _ => return Ok(None),
        };

        Ok(Some(notification))
    }
}

fn stack_of(trace: Option<&StackTrace>, options: &ConsoleOptions) -> Option<String> {
    if !options.include_stack {
        return None;
    }
    trace.map(StackTrace::render).filter(|s| !s.is_empty())
}

// ============================================================================
// NotificationSink
// ============================================================================

/// Destination for console notifications.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is gone. The stream logs and
    /// drops it.
    fn send(&self, notification: ConsoleNotification) -> Result<()>;
}

impl NotificationSink for UnboundedSender<ConsoleNotification> {
    fn send(&self, notification: ConsoleNotification) -> Result<()> {
        UnboundedSender::send(self, notification).map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// ConsoleStreamManager
// ============================================================================

/// Streams console output of one session to a sink.
#[derive(Clone)]
pub struct ConsoleStreamManager {
    manager: ConnectionManager,
    sink: Arc<dyn NotificationSink>,
    options: Arc<Mutex<Option<ConsoleOptions>>>,
}

impl fmt::Debug for ConsoleStreamManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleStreamManager")
            .field("options", &*self.options.lock())
            .finish_non_exhaustive()
    }
}

impl ConsoleStreamManager {
    /// Creates an inactive stream delivering to `sink`.
    #[must_use]
    pub fn new(manager: &ConnectionManager, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            manager: manager.clone(),
            sink,
            options: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts streaming, or replaces the options of an active stream.
    ///
    /// Listeners are registered under a fixed key, so calling this again
    /// never duplicates delivery.
    ///
    /// # Errors
    ///
    /// Returns a connection error if `Runtime.enable` fails; the previous
    /// subscription state is kept in that case.
    pub async fn subscribe(&self, request: SubscribeOptions) -> Result<ConsoleOptions> {
        let options = request.normalize();
        self.manager.ensure_domain("Runtime").await?;

        *self.options.lock() = Some(options.clone());

        let dispatcher = self.manager.dispatcher();
        for method in [methods::CONSOLE_API_CALLED, methods::EXCEPTION_THROWN] {
            let state = Arc::clone(&self.options);
            let sink = Arc::clone(&self.sink);
            dispatcher.register(method, LISTENER_KEY, move |event| deliver(&state, sink.as_ref(), event));
        }

        info!(levels = ?options.levels, "Console stream subscribed");
        Ok(options)
    }

    /// Stops streaming. Returns `false` if it was not active.
    pub fn unsubscribe(&self) -> bool {
        let dispatcher = self.manager.dispatcher();
        dispatcher.unregister(methods::CONSOLE_API_CALLED, LISTENER_KEY);
        dispatcher.unregister(methods::EXCEPTION_THROWN, LISTENER_KEY);

        let was_active = self.options.lock().take().is_some();
        if was_active {
            info!("Console stream unsubscribed");
        }
        was_active
    }

    /// Returns `true` while streaming.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.options.lock().is_some()
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> Option<ConsoleOptions> {
        self.options.lock().clone()
    }
}

/// Listener body. Sink failures are logged and dropped.
fn deliver(
    state: &Mutex<Option<ConsoleOptions>>,
    sink: &dyn NotificationSink,
    event: &Event,
) -> Result<()> {
    let Some(options) = state.lock().clone() else {
        return Ok(());
    };

    if let Some(notification) = ConsoleNotification::from_event(event, &options)?
        && let Err(e) = sink.send(notification)
    {
        debug!(method = %event.method, error = %e, "Console notification dropped");
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use crate::testing::MockConnector;

    fn console_call(kind: &str, text: &str) -> Value {
        json!({
            "type": kind,
            "args": [{"type": "string", "value": text}],
            "timestamp": 1_700_000_000_000.0,
            "stackTrace": {"callFrames": [{"functionName": "main", "url": "https://x/app.js", "lineNumber": 4, "columnNumber": 2}]}
        })
    }

    async fn stream() -> (
        Arc<MockConnector>,
        ConsoleStreamManager,
        mpsc::UnboundedReceiver<ConsoleNotification>,
    ) {
        let mock = MockConnector::new();
        let manager = ConnectionManager::with_connector(mock.clone(), 100);
        let (tx, rx) = mpsc::unbounded_channel();
        let console = ConsoleStreamManager::new(&manager, Arc::new(tx));
        (mock, console, rx)
    }

    #[test]
    fn test_level_mapping() {
        let cases = [
            ("error", ConsoleLevel::Error, Severity::Error),
            ("assert", ConsoleLevel::Error, Severity::Error),
            ("warning", ConsoleLevel::Warn, Severity::Warning),
            ("debug", ConsoleLevel::Debug, Severity::Debug),
            ("info", ConsoleLevel::Info, Severity::Info),
            ("log", ConsoleLevel::Log, Severity::Info),
            ("table", ConsoleLevel::Log, Severity::Info),
            ("startGroup", ConsoleLevel::Log, Severity::Info),
        ];
        for (call_type, level, severity) in cases {
            assert_eq!(ConsoleLevel::from_call_type(call_type), level, "{call_type}");
            assert_eq!(level.severity(), severity, "{call_type}");
        }
    }

    #[test]
    fn test_normalize_defaults() {
        let options = SubscribeOptions::default().normalize();
        assert_eq!(options.levels, ConsoleLevel::ALL);
        assert!(options.include_exceptions);
        assert!(!options.include_stack);

        let options = SubscribeOptions::default()
            .levels([ConsoleLevel::Error, ConsoleLevel::Warn, ConsoleLevel::Error])
            .normalize();
        assert_eq!(options.levels, [ConsoleLevel::Warn, ConsoleLevel::Error]);
    }

    #[tokio::test]
    async fn test_error_level_filter() {
        let (mock, console, mut rx) = stream().await;
        console
            .subscribe(SubscribeOptions::default().levels([ConsoleLevel::Error]))
            .await
            .expect("subscribe");

        mock.emit(methods::CONSOLE_API_CALLED, console_call("log", "just saying"));
        mock.emit(methods::CONSOLE_API_CALLED, console_call("error", "it broke"));

        let notification = rx.try_recv().expect("one notification");
        assert_eq!(notification.level, Severity::Error);
        assert_eq!(notification.text, "it broke");
        assert_eq!(notification.url.as_deref(), Some("https://x/app.js"));
        assert_eq!(notification.line, Some(4));
        assert!(notification.stack.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_twice_delivers_once() {
        let (mock, console, mut rx) = stream().await;
        console.subscribe(SubscribeOptions::default()).await.expect("subscribe");
        console.subscribe(SubscribeOptions::default()).await.expect("subscribe again");

        mock.emit(methods::CONSOLE_API_CALLED, console_call("info", "once"));

        assert_eq!(rx.try_recv().expect("notification").text, "once");
        assert!(rx.try_recv().is_err());
        assert_eq!(mock.count("Runtime.enable"), 1);
    }

    #[tokio::test]
    async fn test_exceptions_and_stack() {
        let (mock, console, mut rx) = stream().await;
        console
            .subscribe(SubscribeOptions::default().include_stack(true))
            .await
            .expect("subscribe");

        mock.emit(
            methods::EXCEPTION_THROWN,
            json!({
                "timestamp": 1_700_000_000.0,
                "exceptionDetails": {
                    "text": "Uncaught",
                    "url": "https://x/app.js",
                    "lineNumber": 10,
                    "columnNumber": 3,
                    "exception": {"type": "object", "description": "Error: kaboom"},
                    "stackTrace": {"callFrames": [{"functionName": "", "url": "https://x/app.js", "lineNumber": 10, "columnNumber": 3}]}
                }
            }),
        );

        let notification = rx.try_recv().expect("exception");
        assert_eq!(notification.logger, "exception");
        assert_eq!(notification.text, "Error: kaboom (https://x/app.js:10:3)");
        assert_eq!(notification.stack.as_deref(), Some("    at <anonymous> (https://x/app.js:10:3)"));
        assert_eq!(notification.timestamp, 1_700_000_000_000.0);

        console
            .subscribe(SubscribeOptions::default().include_exceptions(false))
            .await
            .expect("resubscribe");
        mock.emit(
            methods::EXCEPTION_THROWN,
            json!({"timestamp": 1.0, "exceptionDetails": {"text": "Uncaught"}}),
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let (mock, console, mut rx) = stream().await;
        assert!(!console.unsubscribe());

        console.subscribe(SubscribeOptions::default()).await.expect("subscribe");
        assert!(console.is_active());
        assert!(console.unsubscribe());
        assert!(!console.unsubscribe());
        assert!(console.options().is_none());

        mock.emit(methods::CONSOLE_API_CALLED, console_call("error", "ignored"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let (mock, console, rx) = stream().await;
        console.subscribe(SubscribeOptions::default()).await.expect("subscribe");
        drop(rx);

        mock.emit(methods::CONSOLE_API_CALLED, console_call("error", "nobody listens"));

        // The session keeps working and still buffers the entry.
        assert!(console.is_active());
        assert_eq!(console.manager.entry_count(), 1);
    }
}
