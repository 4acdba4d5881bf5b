//! Bounded log-entry buffer.
//!
//! Console calls, uncaught exceptions and browser log entries are folded into
//! one insertion-ordered buffer. The oldest entry is evicted once the buffer
//! is full. Entry ids count up from 1 and restart whenever the buffer is
//! cleared or the connection resets.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LOG_CAPACITY;
use crate::console::ConsoleLevel;
use crate::protocol::ParsedEvent;

use super::evaluation::render_value;

// ============================================================================
// Constants
// ============================================================================

/// Default number of entries returned by a query.
const DEFAULT_QUERY_LIMIT: usize = 20;

/// Values above this are epoch milliseconds already.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

// ============================================================================
// Timestamps
// ============================================================================

/// Normalizes a protocol timestamp to milliseconds.
///
/// The unit is guessed from magnitude alone:
///
/// | Value | Read as | Result |
/// |-------|---------|--------|
/// | `> 1e12` | epoch milliseconds | unchanged |
/// | `> 1e6` | epoch seconds | `× 1000` |
/// | otherwise | seconds (monotonic clock) | `× 1000` |
///
/// This is a heuristic, not something the protocol guarantees. Millisecond
/// values between `1e6` and `1e12` (a monotonic clock in milliseconds, for
/// instance) come out a thousand times too large.
#[must_use]
pub fn normalize_timestamp(value: f64) -> f64 {
    // Epoch seconds and monotonic seconds scale the same way.
    if value > EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    }
}

// ============================================================================
// LogKind
// ============================================================================

/// Origin of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// `console.*` call.
    Console,
    /// Uncaught exception.
    Exception,
    /// Browser log entry.
    Log,
}

impl LogKind {
    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Exception => "exception",
            Self::Log => "log",
        }
    }
}

// ============================================================================
// LogEntry
// ============================================================================

/// One buffered log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Position in the current connection epoch, starting at 1.
    pub id: u64,
    /// Origin.
    pub kind: LogKind,
    /// Level name as reported or mapped (`error`, `warn`, `info`, ...).
    pub level: String,
    /// Entry text.
    pub message: String,
    /// Milliseconds, normalized with [`normalize_timestamp`].
    pub timestamp: f64,
    /// Sub-origin (`console-api`, `network`, `violation`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Related script or resource URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl LogEntry {
    /// Creates an entry. The id is assigned when the entry is buffered.
    #[must_use]
    pub fn new(kind: LogKind, level: impl Into<String>, message: impl Into<String>, timestamp: f64) -> Self {
        Self {
            id: 0,
            kind,
            level: level.into(),
            message: message.into(),
            timestamp,
            source: None,
            url: None,
        }
    }

    /// Sets the sub-origin.
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the related URL. Empty URLs are dropped.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|u| !u.is_empty());
        self
    }

    /// Builds an entry from a log-producing event.
    ///
    /// Returns `None` for events that do not produce entries.
    #[must_use]
    pub fn from_event(event: &ParsedEvent) -> Option<Self> {
        match event {
            ParsedEvent::ConsoleApiCalled(call) => {
                let message = call
                    .args
                    .iter()
                    .map(render_value)
                    .collect::<Vec<_>>()
                    .join(" ");
                let url = call
                    .stack_trace
                    .as_ref()
                    .and_then(|trace| trace.call_frames.first())
                    .map(|frame| frame.url.clone());

                Some(
                    Self::new(
                        LogKind::Console,
                        ConsoleLevel::from_call_type(&call.kind).as_str(),
                        message,
                        normalize_timestamp(call.timestamp),
                    )
                    .with_source("console-api")
                    .with_url(url),
                )
            }

            ParsedEvent::ExceptionThrown(thrown) => {
                let details = &thrown.exception_details;
                Some(
                    Self::new(
                        LogKind::Exception,
                        "error",
                        details.message(),
                        normalize_timestamp(thrown.timestamp),
                    )
                    .with_source("exception")
                    .with_url(details.url.clone()),
                )
            }

            ParsedEvent::LogEntryAdded(added) => {
                let entry = &added.entry;
                Some(
                    Self::new(
                        LogKind::Log,
                        entry.level.clone(),
                        entry.text.clone(),
                        normalize_timestamp(entry.timestamp),
                    )
                    .with_source(entry.source.clone())
                    .with_url(entry.url.clone()),
                )
            }

            _ => None,
        }
    }
}

// ============================================================================
// EntryQuery
// ============================================================================

/// Parameters for [`LogBuffer::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    /// Maximum entries returned (the most recent ones).
    pub limit: usize,
    /// Kinds to include; `None` includes all.
    pub kinds: Option<Vec<LogKind>>,
    /// Order newest first.
    pub newest_first: bool,
}

impl Default for EntryQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            kinds: None,
            newest_first: true,
        }
    }
}

impl EntryQuery {
    /// Sets the limit.
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts the query to `kinds`.
    #[inline]
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = LogKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Sets the ordering.
    #[inline]
    #[must_use]
    pub fn with_newest_first(mut self, newest_first: bool) -> Self {
        self.newest_first = newest_first;
        self
    }
}

// ============================================================================
// LogBuffer
// ============================================================================

/// FIFO buffer of [`LogEntry`] values with a fixed capacity.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// Creates an empty buffer. Zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Appends an entry, assigning the next id. Evicts the oldest entry when full.
    pub fn push(&mut self, mut entry: LogEntry) -> u64 {
        entry.id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);

        self.next_id - 1
    }

    /// Returns the most recent `limit` entries of the requested kinds.
    #[must_use]
    pub fn query(&self, query: &EntryQuery) -> Vec<LogEntry> {
        let matching: Vec<&LogEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                query
                    .kinds
                    .as_ref()
                    .is_none_or(|kinds| kinds.contains(&entry.kind))
            })
            .collect();

        let start = matching.len().saturating_sub(query.limit);
        let mut window: Vec<LogEntry> = matching[start..].iter().map(|e| (*e).clone()).collect();

        if query.newest_first {
            window.reverse();
        }
        window
    }

    /// Empties the buffer and restarts ids at 1.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
    }

    /// Returns the number of buffered entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the id the next entry will get.
    #[inline]
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

// ============================================================================
// Tests
// ============================================================================
