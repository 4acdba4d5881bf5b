//! Per-event listener table.
//!
//! Listeners are keyed by event method and a caller-chosen key. Registering a
//! key that is already present replaces the earlier handler, so a component
//! can register the same listener any number of times and still see each
//! event once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::error::Result;
use crate::protocol::Event;

// ============================================================================
// Types
// ============================================================================

/// Event handler. Errors are logged by the dispatcher, never propagated.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

struct Listener {
    key: String,
    handler: EventHandler,
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Routes events to registered listeners in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    table: RwLock<FxHashMap<String, Vec<Listener>>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        let mut map = f.debug_map();
        for (method, listeners) in table.iter() {
            let keys: Vec<&str> = listeners.iter().map(|l| l.key.as_str()).collect();
            map.entry(method, &keys);
        }
        map.finish()
    }
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` under `key`.
    ///
    /// Returns `false` if `key` was already registered for `method`; the new
    /// handler then replaces the old one in place.
    pub fn register<F>(&self, method: &str, key: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let key = key.into();
        let handler: EventHandler = Arc::new(handler);

        let mut table = self.table.write();
        let listeners = table.entry(method.to_string()).or_default();

        if let Some(existing) = listeners.iter_mut().find(|l| l.key == key) {
            existing.handler = handler;
            return false;
        }

        trace!(method, key = %key, "Listener registered");
        listeners.push(Listener { key, handler });
        true
    }

    /// Removes the listener registered under `key` for `method`.
    ///
    /// Returns `false` if there was none.
    pub fn unregister(&self, method: &str, key: &str) -> bool {
        let mut table = self.table.write();
        let Some(listeners) = table.get_mut(method) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|l| l.key != key);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            table.remove(method);
        }
        if removed {
            trace!(method, key, "Listener unregistered");
        }
        removed
    }

    /// Returns `true` if `key` is registered for `method`.
    #[must_use]
    pub fn is_registered(&self, method: &str, key: &str) -> bool {
        self.table
            .read()
            .get(method)
            .is_some_and(|listeners| listeners.iter().any(|l| l.key == key))
    }

    /// Returns the number of listeners for `method`.
    #[must_use]
    pub fn listener_count(&self, method: &str) -> usize {
        self.table.read().get(method).map_or(0, Vec::len)
    }

    /// Calls every listener for the event's method and returns how many ran.
    ///
    /// Handlers run on a snapshot taken before the first call, outside the
    /// table lock, so a handler may register or unregister listeners.
    pub fn dispatch(&self, event: &Event) -> usize {
        let handlers: Vec<(String, EventHandler)> = match self.table.read().get(&event.method) {
            Some(listeners) => listeners
                .iter()
                .map(|l| (l.key.clone(), Arc::clone(&l.handler)))
                .collect(),
            None => return 0,
        };

        for (key, handler) in &handlers {
            if let Err(e) = handler(event) {
                warn!(method = %event.method, key = %key, error = %e, "Event handler failed");
            }
        }
        handlers.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
