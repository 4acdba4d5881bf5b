//! Single-page session state.
//!
//! A [`ConnectionManager`] owns the one connection to a page endpoint and
//! everything tied to its lifetime: the command channel, the enabled domains,
//! and the log buffer. The connection is opened lazily by the first caller
//! that needs it; concurrent first callers share a single attempt.
//!
//! # Connection Epochs
//!
//! Each established connection is one epoch. When the remote side goes away
//! the manager resets every per-connection value and does not reconnect on
//! its own. The next call that needs the connection starts a fresh epoch.
//!
//! Listeners registered through [`ConnectionManager::dispatcher`] belong to
//! the manager, not to an epoch, and keep receiving events after a reconnect.
//!
//! # Example
//!
//! ```ignore
//! use devtools_session::{ConnectionManager, EntryQuery, SessionConfig};
//!
//! let config = SessionConfig::new("ws://127.0.0.1:9222/devtools/page/ABC")?;
//! let manager = ConnectionManager::new(&config);
//!
//! manager.connect().await?;
//! let title = manager.evaluate("document.title").await?;
//! let errors = manager.get_entries(&EntryQuery::default().with_limit(5));
//!
//! manager.dispose().await;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Per-event listener table |
//! | `evaluation` | Evaluation results and value rendering |
//! | `logs` | Bounded log buffer and timestamp normalization |
//! | `page` | Navigation, DOM, input and accessibility passthroughs |
//! | `screenshot` | Screenshot capture |

// ============================================================================
// Submodules
// ============================================================================

/// Per-event listener table.
pub mod dispatcher;

/// Evaluation results.
pub mod evaluation;

/// Log buffer.
pub mod logs;

/// Page-level commands.
pub mod page;

/// Screenshot capture.
pub mod screenshot;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{BestEffort, Error, Result};
use crate::protocol::{Command, EvaluateResult, Event, RemoteObject, RuntimeCommand, methods};
use crate::transport::{Connector, EventSink, Transport, WebSocketConnector};

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{EventDispatcher, EventHandler};
pub use evaluation::{EvaluationResult, render_value};
pub use logs::{EntryQuery, LogBuffer, LogEntry, LogKind, normalize_timestamp};
pub use page::KeyPress;
pub use screenshot::{ImageFormat, Screenshot, ScreenshotOptions};

// ============================================================================
// Constants
// ============================================================================

/// Domains enabled on every new connection.
const SETUP_DOMAINS: [&str; 3] = ["Runtime", "Page", "Log"];

// ============================================================================
// Types
// ============================================================================

/// Connect attempt shared by every caller that arrives while it is in flight.
type ConnectAttempt = Shared<BoxFuture<'static, std::result::Result<Arc<dyn Transport>, Arc<Error>>>>;

/// Per-connection state.
struct SessionState {
    /// Current epoch. Bumped when an attempt starts and on every reset.
    epoch: u64,
    /// Established transport.
    transport: Option<Arc<dyn Transport>>,
    /// In-flight connect attempt.
    pending: Option<ConnectAttempt>,
    /// Domains enabled during this epoch.
    enabled_domains: FxHashSet<String>,
    /// Console, exception and browser log entries.
    logs: LogBuffer,
}

impl SessionState {
    fn new(log_capacity: usize) -> Self {
        Self {
            epoch: 0,
            transport: None,
            pending: None,
            enabled_domains: FxHashSet::default(),
            logs: LogBuffer::new(log_capacity),
        }
    }

    /// Ends the current epoch.
    ///
    /// Drops the transport reference, any pending connect attempt, the
    /// enabled-domain set and the log buffer (restarting entry ids at 1).
    /// Returns the transport so the caller can close it outside the lock.
    fn reset(&mut self) -> Option<Arc<dyn Transport>> {
        self.epoch += 1;
        self.pending = None;
        self.enabled_domains.clear();
        self.logs.clear();
        self.transport.take()
    }
}

/// Shared inner state of a manager.
pub(crate) struct ManagerInner {
    connector: Arc<dyn Connector>,
    dispatcher: EventDispatcher,
    state: Mutex<SessionState>,
    /// Source of unique listener keys for one-shot waits.
    wait_keys: AtomicU64,
}

impl ManagerInner {
    pub(crate) fn current_epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Buffers log-producing events. Returns `false` if `epoch` is stale.
    fn record_event(&self, epoch: u64, event: &Event) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }

        if matches!(
            event.method.as_str(),
            methods::CONSOLE_API_CALLED | methods::EXCEPTION_THROWN | methods::LOG_ENTRY_ADDED
        ) {
            match event.parse() {
                Ok(parsed) => {
                    if let Some(entry) = LogEntry::from_event(&parsed) {
                        state.logs.push(entry);
                    }
                }
                Err(e) => warn!(method = %event.method, error = %e, "Malformed log event"),
            }
        }
        true
    }

    fn handle_disconnect(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return;
        }
        state.reset();
        info!(epoch, "Session disconnected");
    }
}

// ============================================================================
// SessionSink
// ============================================================================

/// Routes one connection's traffic into its manager.
struct SessionSink {
    inner: Weak<ManagerInner>,
    epoch: u64,
}

impl EventSink for SessionSink {
    fn on_event(&self, event: Event) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        trace!(method = %event.method, epoch = self.epoch, "Event received");

        if inner.record_event(self.epoch, &event) {
            inner.dispatcher.dispatch(&event);
        }
    }

    fn on_disconnect(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_disconnect(self.epoch);
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owner of the single page connection.
///
/// Cheap to clone; clones share the same connection and state.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("epoch", &state.epoch)
            .field("connected", &state.transport.is_some())
            .field("log_entries", &state.logs.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Creates a manager for the WebSocket endpoint in `config`.
    ///
    /// Nothing is opened until the first call that needs the connection.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_connector(
            Arc::new(WebSocketConnector::new(config)),
            config.log_capacity(),
        )
    }

    /// Creates a manager over a custom connector.
    #[must_use]
    pub fn with_connector(connector: Arc<dyn Connector>, log_capacity: usize) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                dispatcher: EventDispatcher::new(),
                state: Mutex::new(SessionState::new(log_capacity)),
                wait_keys: AtomicU64::new(1),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Connection
// ============================================================================

impl ConnectionManager {
    /// Establishes the connection if absent.
    ///
    /// Callers arriving while an attempt is in flight wait on that attempt
    /// instead of opening another connection. A new connection enables the
    /// `Runtime`, `Page` and `Log` domains and nudges a target paused
    /// awaiting a debugger.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the endpoint cannot be reached or the
    /// setup commands fail. The failed attempt is discarded; the next call
    /// tries again.
    pub async fn connect(&self) -> Result<()> {
        self.session().await.map(|_| ())
    }

    /// Returns `true` if a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().transport.is_some()
    }

    /// Returns the current connection epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.current_epoch()
    }

    /// Returns a handle to the shared state that does not keep it alive.
    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    /// Returns the listener table.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Closes the connection and resets all per-connection state.
    ///
    /// Close errors are logged and dropped. Safe to call repeatedly.
    pub async fn dispose(&self) {
        let transport = self.inner.state.lock().reset();

        if let Some(transport) = transport {
            transport.close().await.best_effort("close connection");
            info!("Session disposed");
        }
    }

    /// Returns the live transport and its epoch, connecting if needed.
    async fn session(&self) -> Result<(u64, Arc<dyn Transport>)> {
        let (epoch, attempt) = {
            let mut state = self.inner.state.lock();

            if let Some(transport) = &state.transport {
                return Ok((state.epoch, Arc::clone(transport)));
            }

            match &state.pending {
                Some(attempt) => (state.epoch, attempt.clone()),
                None => {
                    state.epoch += 1;
                    let epoch = state.epoch;
                    let sink = Arc::new(SessionSink {
                        inner: Arc::downgrade(&self.inner),
                        epoch,
                    });
                    let attempt = open(Arc::clone(&self.inner.connector), sink)
                        .boxed()
                        .shared();
                    state.pending = Some(attempt.clone());
                    debug!(epoch, "Connect attempt started");
                    (epoch, attempt)
                }
            }
        };

        let outcome = attempt.await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            // Disposed or disconnected while the attempt was in flight.
            if let Ok(transport) = outcome {
                tokio::spawn(async move {
                    transport
                        .close()
                        .await
                        .best_effort("close superseded connection");
                });
            }
            return Err(Error::ConnectionClosed);
        }

        state.pending = None;
        match outcome {
            Ok(transport) => {
                if state.transport.is_none() {
                    state.transport = Some(Arc::clone(&transport));
                    state
                        .enabled_domains
                        .extend(SETUP_DOMAINS.iter().map(|d| (*d).to_string()));
                    info!(epoch, "Session connected");
                }
                Ok((epoch, transport))
            }
            Err(e) => Err(unshare(e)),
        }
    }
}

/// Opens a transport and runs the per-connection setup.
async fn open(
    connector: Arc<dyn Connector>,
    sink: Arc<SessionSink>,
) -> std::result::Result<Arc<dyn Transport>, Arc<Error>> {
    let transport = connector.connect(sink).await.map_err(Arc::new)?;

    for domain in SETUP_DOMAINS {
        if let Err(e) = transport.call(&format!("{domain}.enable"), json!({})).await {
            transport
                .close()
                .await
                .best_effort("close after failed setup");
            return Err(Arc::new(e));
        }
    }

    if let Ok((method, params)) = Command::Runtime(RuntimeCommand::RunIfWaitingForDebugger).into_parts() {
        transport
            .call(&method, params)
            .await
            .best_effort("resume target waiting for debugger");
    }

    Ok(transport)
}

/// Recovers an owned error from a shared connect outcome.
fn unshare(error: Arc<Error>) -> Error {
    match Arc::try_unwrap(error) {
        Ok(error) => error,
        Err(shared) => match shared.as_ref() {
            Error::Connection { message } => Error::connection(message.clone()),
            Error::ConnectionTimeout { timeout_ms } => Error::connection_timeout(*timeout_ms),
            Error::ConnectionClosed => Error::ConnectionClosed,
            Error::Command {
                method,
                code,
                message,
            } => Error::command(method.clone(), *code, message.clone()),
            other => Error::connection(other.to_string()),
        },
    }
}

// ============================================================================
// ConnectionManager - Commands
// ============================================================================

impl ConnectionManager {
    /// Sends a raw command and returns its result.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the connection cannot be established,
    /// the command cannot be delivered, or the endpoint answers with a
    /// protocol error (its message is carried in the error).
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let (_, transport) = self.session().await?;
        debug!(method, "Sending command");
        transport.call(method, params).await
    }

    /// Sends a typed command.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn execute(&self, command: Command) -> Result<Value> {
        let (method, params) = command.into_parts()?;
        self.send_command(&method, params).await
    }

    /// Sends a typed command and deserializes its result.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus [`Error::Json`] if the result
    /// does not match `T`.
    pub async fn execute_as<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        let result = self.execute(command).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Enables `domain` once per connection epoch.
    ///
    /// # Errors
    ///
    /// Returns a connection error if `<domain>.enable` fails.
    pub async fn ensure_domain(&self, domain: &str) -> Result<()> {
        let (epoch, transport) = self.session().await?;

        if self.inner.state.lock().enabled_domains.contains(domain) {
            return Ok(());
        }

        transport.call(&format!("{domain}.enable"), json!({})).await?;
        debug!(domain, "Domain enabled");

        let mut state = self.inner.state.lock();
        if state.epoch == epoch {
            state.enabled_domains.insert(domain.to_string());
        }
        Ok(())
    }

    /// Returns `true` if `domain` is enabled in the current epoch.
    #[must_use]
    pub fn is_domain_enabled(&self, domain: &str) -> bool {
        self.inner.state.lock().enabled_domains.contains(domain)
    }

    /// Returns a fresh listener key with the given prefix.
    pub(crate) fn unique_key(&self, prefix: &str) -> String {
        let n = self.inner.wait_keys.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }
}

// ============================================================================
// ConnectionManager - Evaluation
// ============================================================================

impl ConnectionManager {
    /// Evaluates `expression`, awaiting promises and returning by value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if the expression threw, or a connection
    /// error if the command failed.
    pub async fn evaluate(&self, expression: &str) -> Result<EvaluationResult> {
        self.evaluate_with(expression, true, true).await
    }

    /// Evaluates `expression` with explicit promise and by-value flags.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub async fn evaluate_with(
        &self,
        expression: &str,
        await_promise: bool,
        return_by_value: bool,
    ) -> Result<EvaluationResult> {
        let result = self.evaluate_remote(expression, await_promise, return_by_value).await?;
        Ok(EvaluationResult::from_remote(&result))
    }

    /// Evaluates `expression` and returns the raw remote object.
    pub(crate) async fn evaluate_remote(
        &self,
        expression: &str,
        await_promise: bool,
        return_by_value: bool,
    ) -> Result<RemoteObject> {
        let result: EvaluateResult = self
            .execute_as(Command::Runtime(RuntimeCommand::Evaluate {
                expression: expression.to_string(),
                await_promise,
                return_by_value,
            }))
            .await?;

        if let Some(details) = result.exception_details {
            return Err(Error::evaluation(details.message()));
        }
        Ok(result.result)
    }
}

// ============================================================================
// ConnectionManager - Log Entries
// ============================================================================

impl ConnectionManager {
    /// Returns buffered log entries matching `query`.
    #[must_use]
    pub fn get_entries(&self, query: &EntryQuery) -> Vec<LogEntry> {
        self.inner.state.lock().logs.query(query)
    }

    /// Empties the log buffer and restarts entry ids at 1.
    pub fn clear_entries(&self) {
        self.inner.state.lock().logs.clear();
    }

    /// Returns the number of buffered log entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.state.lock().logs.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::testing::MockConnector;

    fn manager(mock: &Arc<MockConnector>) -> ConnectionManager {
        ConnectionManager::with_connector(Arc::clone(mock) as Arc<dyn Connector>, 500)
    }

    fn console_event(kind: &str, text: &str) -> Value {
        json!({
            "type": kind,
            "args": [{"type": "string", "value": text}],
            "timestamp": 1_700_000_000_000.0
        })
    }

    #[tokio::test]
    async fn test_connect_runs_setup_once() {
        let mock = MockConnector::new();
        let manager = manager(&mock);

        manager.connect().await.expect("connect");
        manager.connect().await.expect("connect again");

        assert_eq!(mock.connect_count(), 1);
        assert_eq!(
            mock.methods(),
            [
                "Runtime.enable",
                "Page.enable",
                "Log.enable",
                "Runtime.runIfWaitingForDebugger"
            ]
        );
        assert!(manager.is_connected());
        assert!(manager.is_domain_enabled("Runtime"));
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_attempt() {
        let mock = MockConnector::new();
        mock.set_connect_delay(Duration::from_millis(20));
        let manager = manager(&mock);

        let (a, b, c) = tokio::join!(
            manager.send_command("Runtime.evaluate", json!({"expression": "1"})),
            manager.connect(),
            manager.ensure_domain("Network"),
        );
        a.expect("command");
        b.expect("connect");
        c.expect("ensure");

        assert_eq!(mock.connect_count(), 1);
        assert_eq!(mock.count("Runtime.enable"), 1);
    }

    #[tokio::test]
    async fn test_resume_nudge_failure_is_ignored() {
        let mock = MockConnector::new();
        mock.fail("Runtime.runIfWaitingForDebugger", "not paused");
        let manager = manager(&mock);

        manager.connect().await.expect("connect");
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_on_next_call() {
        let mock = MockConnector::new();
        mock.refuse_connections(true);
        let manager = manager(&mock);

        let err = manager.connect().await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(!manager.is_connected());

        mock.refuse_connections(false);
        manager.connect().await.expect("second attempt");
        assert_eq!(mock.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_setup_discards_transport() {
        let mock = MockConnector::new();
        mock.fail("Page.enable", "Page domain unavailable");
        let manager = manager(&mock);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
        assert!(err.to_string().contains("Page domain unavailable"));
        assert_eq!(mock.close_count(), 1);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_send_command_carries_protocol_message() {
        let mock = MockConnector::new();
        mock.fail("DOM.describeNode", "Could not find node with given id");
        let manager = manager(&mock);

        let err = manager
            .send_command("DOM.describeNode", json!({"nodeId": 9}))
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
        assert!(err.to_string().contains("Could not find node with given id"));

        // The connection stays usable.
        manager.send_command("DOM.enable", json!({})).await.expect("next command");
        assert_eq!(mock.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_domain_once_per_epoch() {
        let mock = MockConnector::new();
        let manager = manager(&mock);

        manager.ensure_domain("Network").await.expect("enable");
        manager.ensure_domain("Network").await.expect("enable again");
        assert_eq!(mock.count("Network.enable"), 1);

        mock.disconnect();
        manager.ensure_domain("Network").await.expect("enable after reconnect");
        assert_eq!(mock.count("Network.enable"), 2);
    }

    #[tokio::test]
    async fn test_evaluate_value() {
        let mock = MockConnector::new();
        mock.respond(
            "Runtime.evaluate",
            json!({"result": {"type": "object", "value": {"ok": true}, "description": "Object"}}),
        );
        let manager = manager(&mock);

        let result = manager.evaluate("({ok: true})").await.expect("evaluate");
        assert_eq!(result.kind, "object");
        assert_eq!(result.value, r#"{"ok":true}"#);
        assert_eq!(result.description.as_deref(), Some("Object"));

        let params = mock.last_params("Runtime.evaluate").expect("sent");
        assert_eq!(params["awaitPromise"], true);
        assert_eq!(params["returnByValue"], true);
    }

    #[tokio::test]
    async fn test_evaluate_exception() {
        let mock = MockConnector::new();
        mock.respond(
            "Runtime.evaluate",
            json!({
                "result": {"type": "object", "subtype": "error"},
                "exceptionDetails": {
                    "text": "Uncaught",
                    "lineNumber": 0,
                    "columnNumber": 6,
                    "url": "https://example.com/",
                    "exception": {"type": "object", "description": "ReferenceError: nope is not defined"}
                }
            }),
        );
        let manager = manager(&mock);

        let err = manager.evaluate("nope()").await.unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
        assert_eq!(
            err.to_string(),
            "Evaluation failed: ReferenceError: nope is not defined (https://example.com/:0:6)"
        );
    }

    #[tokio::test]
    async fn test_events_fill_log_buffer() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        manager.connect().await.expect("connect");

        mock.emit(methods::CONSOLE_API_CALLED, console_event("log", "first"));
        mock.emit(
            methods::EXCEPTION_THROWN,
            json!({"timestamp": 1.5, "exceptionDetails": {"text": "Uncaught boom"}}),
        );
        mock.emit(
            methods::LOG_ENTRY_ADDED,
            json!({"entry": {"source": "network", "level": "error", "text": "404", "timestamp": 2.0}}),
        );

        let entries = manager.get_entries(&EntryQuery::default());
        let ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, [3, 2, 1]);
        assert_eq!(entries[1].kind, LogKind::Exception);
        assert_eq!(entries[1].message, "Uncaught boom");
        assert_eq!(entries[1].timestamp, 1500.0);

        let console_only = manager.get_entries(&EntryQuery::default().with_kinds([LogKind::Console]));
        assert_eq!(console_only.len(), 1);
        assert_eq!(console_only[0].message, "first");
    }

    #[tokio::test]
    async fn test_clear_entries_restarts_ids() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        manager.connect().await.expect("connect");

        mock.emit(methods::CONSOLE_API_CALLED, console_event("log", "a"));
        mock.emit(methods::CONSOLE_API_CALLED, console_event("log", "b"));
        manager.clear_entries();
        assert!(manager.get_entries(&EntryQuery::default()).is_empty());

        mock.emit(methods::CONSOLE_API_CALLED, console_event("log", "c"));
        let entries = manager.get_entries(&EntryQuery::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 1);
    }

    #[tokio::test]
    async fn test_disconnect_resets_without_reconnecting() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        manager.connect().await.expect("connect");
        mock.emit(methods::CONSOLE_API_CALLED, console_event("warning", "kept?"));
        let first_epoch = manager.epoch();

        mock.disconnect();

        assert!(!manager.is_connected());
        assert_eq!(manager.entry_count(), 0);
        assert_eq!(mock.connect_count(), 1);
        assert!(manager.epoch() > first_epoch);

        manager.send_command("Page.reload", json!({})).await.expect("reconnects");
        assert_eq!(mock.connect_count(), 2);

        mock.emit(methods::CONSOLE_API_CALLED, console_event("log", "fresh"));
        assert_eq!(manager.get_entries(&EntryQuery::default())[0].id, 1);
    }

    #[tokio::test]
    async fn test_dispatcher_survives_reconnect() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        manager.dispatcher().register(methods::LOAD_EVENT_FIRED, "test", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        manager.connect().await.expect("connect");
        mock.emit(methods::LOAD_EVENT_FIRED, json!({"timestamp": 1.0}));
        mock.disconnect();
        manager.connect().await.expect("reconnect");
        mock.emit(methods::LOAD_EVENT_FIRED, json!({"timestamp": 2.0}));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let mock = MockConnector::new();
        let manager = manager(&mock);

        manager.dispose().await;
        manager.connect().await.expect("connect");
        manager.dispose().await;
        manager.dispose().await;

        assert!(!manager.is_connected());
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_during_connect_discards_attempt() {
        let mock = MockConnector::new();
        mock.set_connect_delay(Duration::from_millis(30));
        let manager = manager(&mock);

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.dispose().await;

        let err = pending.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(!manager.is_connected());
    }
}
