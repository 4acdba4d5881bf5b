//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep command ids, DOM node ids and network request ids
//! from being mixed up at compile time.
//!
//! | Type | Origin | Representation |
//! |------|--------|----------------|
//! | [`CommandId`] | Local, per connection | `u64` counter |
//! | [`NodeId`] | Remote DOM agent | `i64` |
//! | [`NetworkRequestId`] | Remote network agent | `String` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Identifier correlating a command with its response.
///
/// Allocated by [`CommandIdGenerator`]; unique within one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator for [`CommandId`]s. Starts at 1.
#[derive(Debug)]
pub struct CommandIdGenerator {
    next: AtomicU64,
}

impl CommandIdGenerator {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    #[inline]
    pub fn next_id(&self) -> CommandId {
        CommandId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CommandIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// NodeId
// ============================================================================

/// DOM node id assigned by the remote DOM agent.
///
/// Only meaningful for the document the agent handed out; a new document
/// (navigation, reconnect) invalidates every previous id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    /// Wraps a raw node id.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw node id.
    #[inline]
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns `true` for ids the agent uses as "no node" (zero or negative).
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// NetworkRequestId
// ============================================================================

/// Request id assigned by the remote network agent.
///
/// Redirects keep the same id, so several lifecycle events of one logical
/// request share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkRequestId(String);

impl NetworkRequestId {
    /// Wraps a raw request id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkRequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NetworkRequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
