//! Scripted in-memory transport for unit tests.
//!
//! [`MockConnector`] hands out [`MockTransport`]s that record every command,
//! answer from per-method scripts and let the test push events and
//! disconnects through the sink of the most recent connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::protocol::Event;
use crate::transport::{Connector, EventSink, Transport};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Err(String),
}

impl Reply {
    fn into_result(self, method: &str) -> Result<Value> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(message) => Err(Error::command(method, -32000, message)),
        }
    }
}

#[derive(Default)]
struct Script {
    calls: Vec<(String, Value)>,
    once: FxHashMap<String, VecDeque<Reply>>,
    always: FxHashMap<String, Reply>,
}

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber filtered by `RUST_LOG`. Later calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockConnector
// ============================================================================

/// Connector that produces scripted transports.
#[derive(Default)]
pub(crate) struct MockConnector {
    script: Arc<Mutex<Script>>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    alive: Mutex<Option<Arc<AtomicBool>>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    refuse: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    /// Answers every `method` call with `result`.
    pub(crate) fn respond(&self, method: &str, result: Value) {
        self.script
            .lock()
            .always
            .insert(method.to_string(), Reply::Ok(result));
    }

    /// Answers the next `method` call with `result`, ahead of `respond`.
    pub(crate) fn respond_once(&self, method: &str, result: Value) {
        self.script
            .lock()
            .once
            .entry(method.to_string())
            .or_default()
            .push_back(Reply::Ok(result));
    }

    /// Fails every `method` call with a protocol error.
    pub(crate) fn fail(&self, method: &str, message: &str) {
        self.script
            .lock()
            .always
            .insert(method.to_string(), Reply::Err(message.to_string()));
    }

    /// Makes `connect` fail until called again with `false`.
    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Delays every `connect`.
    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Pushes an event through the current connection's sink.
    pub(crate) fn emit(&self, method: &str, params: Value) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_event(Event::new(method, params));
        }
    }

    /// Ends the current connection from the remote side.
    pub(crate) fn disconnect(&self) {
        if let Some(alive) = self.alive.lock().take() {
            alive.store(false, Ordering::SeqCst);
        }
        let sink = self.sink.lock().take();
        if let Some(sink) = sink {
            sink.on_disconnect();
        }
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Every recorded method, in send order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.script
            .lock()
            .calls
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub(crate) fn last_params(&self, method: &str) -> Option<Value> {
        self.script
            .lock()
            .calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }

    pub(crate) fn clear_calls(&self) {
        self.script.lock().calls.clear();
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::connection("connection refused"));
        }

        let alive = Arc::new(AtomicBool::new(true));
        *self.sink.lock() = Some(sink);
        *self.alive.lock() = Some(Arc::clone(&alive));

        Ok(Arc::new(MockTransport {
            script: Arc::clone(&self.script),
            alive,
            closes: Arc::clone(&self.closes),
        }))
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// Transport answering from the connector's script.
pub(crate) struct MockTransport {
    script: Arc<Mutex<Script>>,
    alive: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let reply = {
            let mut script = self.script.lock();
            script.calls.push((method.to_string(), params));
            let scripted = script.once.get_mut(method).and_then(VecDeque::pop_front);
            scripted.or_else(|| script.always.get(method).cloned())
        };

        // Let other tasks observe the in-flight command, as a real round trip would.
        tokio::task::yield_now().await;

        reply.map_or_else(|| Ok(json!({})), |reply| reply.into_result(method))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.alive.swap(false, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }
}
