//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to the page endpoint,
//! including command/response correlation and event forwarding.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the endpoint (responses, events)
//! - Outgoing commands from the session
//! - Command/response correlation by numeric id
//! - Event forwarding to the [`EventSink`], in arrival order
//! - A single disconnect notification when the socket ends

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::identifiers::{CommandId, CommandIdGenerator};
use crate::protocol::{Event, Request, Response};

use super::{EventSink, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending commands before rejecting new ones.
const MAX_PENDING_COMMANDS: usize = 100;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of command IDs to response channels.
type CorrelationMap = FxHashMap<CommandId, oneshot::Sender<Result<Response>>>;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Timeouts and limits for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Maximum wait for a command response.
    pub command_timeout: Duration,
    /// Maximum wait for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Commands allowed in flight at once.
    pub max_pending_commands: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending_commands: MAX_PENDING_COMMANDS,
        }
    }
}

impl From<&SessionConfig> for ConnectionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            command_timeout: config.command_timeout(),
            connect_timeout: config.connect_timeout(),
            max_pending_commands: config.max_pending_commands(),
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(CommandId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to one page endpoint.
///
/// Handles command/response correlation and event forwarding.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Command id allocator.
    ids: Arc<CommandIdGenerator>,
    /// Timeouts and limits.
    options: ConnectionOptions,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a WebSocket to `endpoint` and starts the event loop.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::Connection`] if the endpoint refuses the connection
    pub async fn connect(
        endpoint: &str,
        options: ConnectionOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let (ws_stream, _) = timeout(options.connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| Error::connection_timeout(options.connect_timeout.as_millis() as u64))?
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        info!(endpoint = %endpoint, "WebSocket connection established");

        Ok(Self::new(ws_stream, options, sink))
    }

    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(
        ws_stream: WsStream,
        options: ConnectionOptions,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            sink,
        ));

        Self {
            command_tx,
            correlation,
            ids: Arc::new(CommandIdGenerator::new()),
            options,
        }
    }

    /// Sends a request and waits for response with the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending commands
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, self.options.command_timeout)
            .await
    }

    /// Sends a request and waits for response with custom timeout.
    ///
    /// A timeout only stops waiting; the command itself is not cancelled and
    /// a late response is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending commands
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let command_id = request.id;
        let method = request.method.clone();

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= self.options.max_pending_commands {
                warn!(
                    pending = correlation.len(),
                    max = self.options.max_pending_commands,
                    "Too many pending commands"
                );
                return Err(Error::protocol(format!(
                    "Too many pending commands: {}/{}",
                    correlation.len(),
                    self.options.max_pending_commands
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(command_id));

                Err(Error::request_timeout(
                    command_id,
                    method,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Shuts down the connection gracefully.
    pub fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Shutdown)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        sink: Arc<dyn EventSink>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, sink.as_ref());
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(command_id)) => {
                            correlation.lock().remove(&command_id);
                            debug!(%command_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Stop accepting commands before failing what is queued.
        command_rx.close();
        Self::fail_pending_requests(&correlation);
        sink.on_disconnect();

        debug!("Event loop terminated");
    }

    /// Handles an incoming text frame from the endpoint.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        sink: &dyn EventSink,
    ) {
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown command");
            }

            return;
        }

        if let Ok(event) = from_str::<Event>(text) {
            trace!(method = %event.method, "Event received");
            sink.on_event(event);
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Handles a send command from the session.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut futures_util::stream::SplitSink<WsStream, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let command_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(command_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&command_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(%command_id, method = %request.method, "Command sent");
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on shutdown");
        }
    }
}

#[async_trait]
impl Transport for Connection {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = Request::new(self.ids.next_id(), method, params);
        self.send(request).await?.into_result(method)
    }

    async fn close(&self) -> Result<()> {
        self.shutdown()
    }
}

// ============================================================================
// Tests
// ============================================================================
