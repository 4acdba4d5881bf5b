//! Single-highlight overlay.
//!
//! An [`OverlayManager`] keeps at most one element highlighted. A highlight
//! combines the native overlay box with an in-page decoration and an
//! optional auto-hide timer:
//!
//! ```text
//! idle ──highlight──▶ highlighted ──hide / timer──▶ idle
//!                          │
//!                          └──highlight──▶ (hide, then apply) ──▶ highlighted
//! ```
//!
//! Highlight and hide are serialized, so a new highlight always sees the
//! previous one fully restored. Restoration is best-effort: failures are
//! logged and never reach the caller.
//!
//! # Example
//!
//! ```ignore
//! use devtools_session::{HighlightOptions, OverlayManager};
//!
//! let overlay = OverlayManager::new(&manager);
//! let outcome = overlay
//!     .highlight(HighlightOptions::selector("#submit").with_duration_ms(5_000))
//!     .await?;
//!
//! overlay.hide().await;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// In-page decoration apply/restore.
pub mod decoration;

/// Highlight options and colors.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{BestEffort, Error, Result};
use crate::identifiers::NodeId;
use crate::protocol::{Command, OverlayCommand};
use crate::session::{ConnectionManager, Screenshot};

// ============================================================================
// Re-exports
// ============================================================================

pub use decoration::StyleSnapshot;
pub use options::{DEFAULT_DURATION_MS, HighlightColors, HighlightOptions, Rgba};

// ============================================================================
// HighlightOutcome
// ============================================================================

/// Result of a successful highlight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightOutcome {
    /// Highlighted node.
    pub node_id: NodeId,
    /// Whether the in-page decoration was applied.
    pub decorated: bool,
    /// Auto-hide delay, if a timer was armed.
    pub expires_in_ms: Option<u64>,
    /// Screenshot taken after the highlight was applied.
    pub screenshot: Option<Screenshot>,
}

// ============================================================================
// Internal State
// ============================================================================

#[derive(Default)]
struct OverlayState {
    /// Saved styles of decorated elements.
    decorated: FxHashMap<NodeId, StyleSnapshot>,
    /// Pending auto-hide task.
    timer: Option<JoinHandle<()>>,
    /// Bumped on every hide; a timer only fires for its own generation.
    generation: u64,
    /// Node under the native highlight.
    highlighted: Option<NodeId>,
    /// Connection epoch the highlight was applied in.
    epoch: u64,
}

struct OverlayInner {
    manager: ConnectionManager,
    /// Serializes highlight, hide and timer expiry.
    ops: tokio::sync::Mutex<()>,
    state: Mutex<OverlayState>,
}

impl Drop for OverlayInner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}

impl OverlayInner {
    /// Clears the highlight. Caller holds `ops`.
    async fn hide_locked(&self) {
        let (snapshots, was_highlighted, epoch) = {
            let mut state = self.state.lock();
            state.generation += 1;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            let snapshots: Vec<_> = state.decorated.drain().collect();
            (snapshots, state.highlighted.take().is_some(), state.epoch)
        };

        if !was_highlighted && snapshots.is_empty() {
            return;
        }

        // Node ids do not survive a reconnect.
        if self.manager.epoch() != epoch || !self.manager.is_connected() {
            debug!(epoch, "Connection changed, dropping highlight state");
            return;
        }

        join_all(snapshots.iter().map(|(node_id, snapshot)| async move {
            decoration::restore(&self.manager, *node_id, snapshot)
                .await
                .best_effort("restore decoration");
        }))
        .await;

        self.manager
            .execute(Command::Overlay(OverlayCommand::HideHighlight))
            .await
            .best_effort("hide highlight");

        debug!(restored = snapshots.len(), "Highlight hidden");
    }

    /// Resolves the node a highlight targets. A node id wins over a selector.
    async fn resolve_target(&self, options: &HighlightOptions) -> Result<NodeId> {
        match (options.node_id, options.selector.as_deref()) {
            (Some(node_id), _) => Ok(node_id),
            (None, Some(selector)) => self
                .manager
                .query_selector(selector)
                .await?
                .ok_or_else(|| Error::not_found(format!("element matching '{selector}'"))),
            (None, None) => Err(Error::invalid_argument(
                "highlight needs a selector or a node id",
            )),
        }
    }
}

/// Arms the auto-hide timer for the current generation.
fn arm_timer(inner: &Arc<OverlayInner>, delay: Duration) {
    let weak: Weak<OverlayInner> = Arc::downgrade(inner);
    let mut state = inner.state.lock();
    let generation = state.generation;

    state.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let _ops = inner.ops.lock().await;
        {
            let mut state = inner.state.lock();
            if state.generation != generation {
                return;
            }
            // Our own handle; dropping it does not abort this task.
            state.timer = None;
        }

        debug!(?delay, "Highlight expired");
        inner.hide_locked().await;
    }));
}

// ============================================================================
// OverlayManager
// ============================================================================

/// Owner of the single active highlight.
#[derive(Clone)]
pub struct OverlayManager {
    inner: Arc<OverlayInner>,
}

impl fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("OverlayManager")
            .field("highlighted", &state.highlighted)
            .field("decorated", &state.decorated.len())
            .field("timer", &state.timer.is_some())
            .finish_non_exhaustive()
    }
}

impl OverlayManager {
    /// Creates an overlay bound to `manager`.
    #[must_use]
    pub fn new(manager: &ConnectionManager) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                manager: manager.clone(),
                ops: tokio::sync::Mutex::new(()),
                state: Mutex::new(OverlayState::default()),
            }),
        }
    }

    /// Highlights one element, replacing any previous highlight.
    ///
    /// The previous highlight is hidden first even if this call then fails.
    /// Decoration failures are logged and reported through
    /// [`HighlightOutcome::decorated`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if neither a node id nor a selector is set
    /// - [`Error::NotFound`] if the selector matches nothing
    /// - A connection error if applying the highlight or taking the
    ///   screenshot fails
    pub async fn highlight(&self, options: HighlightOptions) -> Result<HighlightOutcome> {
        let inner = &self.inner;
        let manager = &inner.manager;
        let _ops = inner.ops.lock().await;

        inner.hide_locked().await;

        let node_id = inner.resolve_target(&options).await?;

        manager.ensure_domain("DOM").await?;
        manager.ensure_domain("Overlay").await?;
        manager
            .execute(Command::Overlay(OverlayCommand::HighlightNode {
                highlight_config: options.highlight_config(),
                node_id,
            }))
            .await?;

        {
            let mut state = inner.state.lock();
            state.highlighted = Some(node_id);
            state.epoch = manager.epoch();
        }

        let snapshot = decoration::decorate(manager, node_id, &options.colors.border.to_css())
            .await
            .best_effort("decorate element");
        let decorated = snapshot.is_some();
        if let Some(snapshot) = snapshot {
            inner.state.lock().decorated.insert(node_id, snapshot);
        }

        let expires_in_ms = u64::try_from(options.duration_ms)
            .ok()
            .filter(|ms| *ms > 0);
        if let Some(ms) = expires_in_ms {
            arm_timer(inner, Duration::from_millis(ms));
        }

        info!(%node_id, decorated, expires_in_ms, "Highlight applied");

        let screenshot = if options.return_screenshot {
            Some(manager.capture_screenshot(options.screenshot).await?)
        } else {
            None
        };

        Ok(HighlightOutcome {
            node_id,
            decorated,
            expires_in_ms,
            screenshot,
        })
    }

    /// Highlights the focused element, or the document root if nothing
    /// has focus.
    ///
    /// Any target in `options` is replaced.
    ///
    /// # Errors
    ///
    /// Same as [`highlight`](Self::highlight); also fails if the document
    /// root cannot be read.
    pub async fn highlight_focused(&self, options: HighlightOptions) -> Result<HighlightOutcome> {
        let node_id = match self.focused_node().await {
            Some(node_id) => node_id,
            None => {
                debug!("No focused element, falling back to document root");
                self.inner.manager.document_root().await?
            }
        };

        self.highlight(options.with_node(node_id)).await
    }

    async fn focused_node(&self) -> Option<NodeId> {
        let manager = &self.inner.manager;

        let object = manager
            .evaluate_remote("document.activeElement", false, false)
            .await
            .best_effort("read focused element")?;
        let object_id = object.object_id?;

        let node_id = manager
            .request_node(&object_id)
            .await
            .best_effort("resolve focused element")
            .flatten();

        manager
            .release_object(&object_id)
            .await
            .best_effort("release focused element");

        node_id
    }

    /// Clears the highlight, restoring decorated elements.
    ///
    /// Safe to call with nothing active.
    pub async fn hide(&self) {
        let _ops = self.inner.ops.lock().await;
        self.inner.hide_locked().await;
    }

    /// Clears the highlight and cancels the timer.
    pub async fn dispose(&self) {
        self.hide().await;
    }

    /// Returns `true` while a highlight is applied.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().highlighted.is_some()
    }

    /// Returns the currently decorated nodes, sorted.
    #[must_use]
    pub fn decorated_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.inner.state.lock().decorated.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Returns `true` while an auto-hide timer is armed.
    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
