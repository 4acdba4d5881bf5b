//! In-page element decoration.
//!
//! A decoration overrides an element's outline and box shadow so the target
//! stays visible outside the native highlight. The prior inline values are
//! returned as a [`StyleSnapshot`] and kept by the overlay, keyed by node id,
//! until they are written back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BestEffort, Error, Result};
use crate::identifiers::NodeId;
use crate::protocol::CallArgument;
use crate::session::ConnectionManager;

// ============================================================================
// Page Functions
// ============================================================================

/// Applies the decoration and returns the prior inline values.
const APPLY: &str = r"function(color) {
    const style = this.style;
    const prior = {
        outline: style.outline,
        outlineOffset: style.outlineOffset,
        boxShadow: style.boxShadow
    };
    style.outline = '3px solid ' + color;
    style.outlineOffset = '2px';
    style.boxShadow = '0 0 0 6px ' + color.replace(/[\d.]+\)$/, '0.35)');
    return prior;
}";

/// Writes a snapshot back.
const RESTORE: &str = r"function(prior) {
    this.style.outline = prior.outline;
    this.style.outlineOffset = prior.outlineOffset;
    this.style.boxShadow = prior.boxShadow;
}";

// ============================================================================
// StyleSnapshot
// ============================================================================

/// Inline style values an element had before decoration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSnapshot {
    /// Inline `outline`.
    pub outline: String,
    /// Inline `outline-offset`.
    pub outline_offset: String,
    /// Inline `box-shadow`.
    pub box_shadow: String,
}

// ============================================================================
// Operations
// ============================================================================

/// Decorates `node_id` with `color` and returns its prior style.
pub(crate) async fn decorate(
    manager: &ConnectionManager,
    node_id: NodeId,
    color: &str,
) -> Result<StyleSnapshot> {
    let prior = call_on_node(manager, node_id, APPLY, CallArgument::value(color)).await?;

    match prior {
        Value::Null => Ok(StyleSnapshot::default()),
        value => Ok(serde_json::from_value(value)?),
    }
}

/// Restores `snapshot` on `node_id`.
pub(crate) async fn restore(
    manager: &ConnectionManager,
    node_id: NodeId,
    snapshot: &StyleSnapshot,
) -> Result<()> {
    let argument = CallArgument::value(serde_json::to_value(snapshot)?);
    call_on_node(manager, node_id, RESTORE, argument).await?;
    Ok(())
}

/// Runs `declaration` on the element behind `node_id`, releasing the handle
/// afterwards.
async fn call_on_node(
    manager: &ConnectionManager,
    node_id: NodeId,
    declaration: &str,
    argument: CallArgument,
) -> Result<Value> {
    let object = manager.resolve_node(node_id).await?;
    let object_id = object
        .object_id
        .ok_or_else(|| Error::not_found(format!("remote object for node {node_id}")))?;

    let outcome = manager
        .call_function_on(&object_id, declaration, vec![argument])
        .await;

    manager
        .release_object(&object_id)
        .await
        .best_effort("release node handle");

    Ok(outcome?.value.unwrap_or(Value::Null))
}
