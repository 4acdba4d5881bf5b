//! Command definitions organized by domain.
//!
//! Commands follow `Domain.methodName` format and serialize to
//! `{"method": ..., "params": {...}}`, which [`Command::into_parts`] splits
//! for the transport.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Runtime` | Evaluation, function calls, object release |
//! | `Page` | Navigation, screenshots, focus |
//! | `DOM` | Document, query, resolve, describe |
//! | `Overlay` | Highlight apply/hide |
//! | `Network` | Body retrieval |
//! | `Input` | Key and text dispatch |
//! | `Accessibility` | Full tree snapshot |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{NetworkRequestId, NodeId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All typed protocol commands organized by domain.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// DOM domain commands.
    Dom(DomCommand),
    /// Overlay domain commands.
    Overlay(OverlayCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Input domain commands.
    Input(InputCommand),
    /// Accessibility domain commands.
    Accessibility(AccessibilityCommand),
}

impl Command {
    /// Splits the command into method name and params object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the command does not serialize to a
    /// `{method, params}` object.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let Value::Object(mut object) = serde_json::to_value(&self)? else {
            return Err(Error::protocol("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("command is missing its method")),
        };
        let params = object
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok((method, params))
    }
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Source to evaluate.
        expression: String,
        /// Wait for a returned promise to settle.
        await_promise: bool,
        /// Return the value itself instead of a handle.
        return_by_value: bool,
    },

    /// Call a function with `this` bound to a remote object.
    #[serde(rename = "Runtime.callFunctionOn")]
    CallFunctionOn {
        /// Function source.
        function_declaration: String,
        /// Receiver handle.
        object_id: String,
        /// Positional arguments.
        arguments: Vec<CallArgument>,
        /// Return the value itself instead of a handle.
        return_by_value: bool,
        /// Wait for a returned promise to settle.
        await_promise: bool,
    },

    /// Release a remote object handle.
    #[serde(rename = "Runtime.releaseObject")]
    ReleaseObject {
        /// Handle to release.
        object_id: String,
    },

    /// Resume a target paused awaiting a debugger.
    #[serde(rename = "Runtime.runIfWaitingForDebugger")]
    RunIfWaitingForDebugger,
}

/// Argument passed to `Runtime.callFunctionOn`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallArgument {
    /// By-value argument.
    pub value: Value,
}

impl CallArgument {
    /// Wraps a JSON value.
    #[inline]
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum PageCommand {
    /// Navigate the page.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Target URL.
        url: String,
    },

    /// Bring the page to the foreground.
    #[serde(rename = "Page.bringToFront")]
    BringToFront,

    /// Capture the page as an image.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot {
        /// `png`, `jpeg` or `webp`.
        format: String,
        /// Compression quality for lossy formats.
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
        /// Capture content outside the viewport.
        capture_beyond_viewport: bool,
        /// Capture from the compositor surface.
        from_surface: bool,
    },
}

// ============================================================================
// DOM Commands
// ============================================================================

/// DOM domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum DomCommand {
    /// Return the root document node.
    #[serde(rename = "DOM.getDocument")]
    GetDocument {
        /// Child depth to include.
        depth: i32,
    },

    /// First element matching a selector under a node.
    #[serde(rename = "DOM.querySelector")]
    QuerySelector {
        /// Node to search under.
        node_id: NodeId,
        /// CSS selector.
        selector: String,
    },

    /// Remote object handle for a node.
    #[serde(rename = "DOM.resolveNode")]
    ResolveNode {
        /// Node to resolve.
        node_id: NodeId,
    },

    /// Node id for a remote object handle.
    #[serde(rename = "DOM.requestNode")]
    RequestNode {
        /// Handle to look up.
        object_id: String,
    },

    /// Node description.
    #[serde(rename = "DOM.describeNode")]
    DescribeNode {
        /// Node to describe.
        node_id: NodeId,
        /// Child depth to include.
        depth: i32,
    },
}

// ============================================================================
// Overlay Commands
// ============================================================================

/// Overlay domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum OverlayCommand {
    /// Highlight a node.
    #[serde(rename = "Overlay.highlightNode")]
    HighlightNode {
        /// Colors and flags.
        highlight_config: Value,
        /// Node to highlight.
        node_id: NodeId,
    },

    /// Remove any highlight.
    #[serde(rename = "Overlay.hideHighlight")]
    HideHighlight,
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum NetworkCommand {
    /// Response body of a finished request.
    #[serde(rename = "Network.getResponseBody")]
    GetResponseBody {
        /// Request id.
        request_id: NetworkRequestId,
    },

    /// Body sent with a request.
    #[serde(rename = "Network.getRequestPostData")]
    GetRequestPostData {
        /// Request id.
        request_id: NetworkRequestId,
    },
}

// ============================================================================
// Input Commands
// ============================================================================

/// Input domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum InputCommand {
    /// Insert text as if typed, without key events.
    #[serde(rename = "Input.insertText")]
    InsertText {
        /// Text to insert.
        text: String,
    },

    /// Dispatch a single key event.
    #[serde(rename = "Input.dispatchKeyEvent")]
    DispatchKeyEvent {
        /// `keyDown`, `keyUp`, `rawKeyDown` or `char`.
        #[serde(rename = "type")]
        event_type: String,
        /// DOM `key` value.
        key: String,
        /// DOM `code` value.
        code: String,
        /// Text produced by the key.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Windows virtual key code.
        #[serde(skip_serializing_if = "Option::is_none")]
        windows_virtual_key_code: Option<u32>,
        /// Modifier bit field (Alt=1, Ctrl=2, Meta=4, Shift=8).
        modifiers: u32,
    },
}

// ============================================================================
// Accessibility Commands
// ============================================================================

/// Accessibility domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum AccessibilityCommand {
    /// Full accessibility tree.
    #[serde(rename = "Accessibility.getFullAXTree")]
    GetFullAxTree,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_evaluate_parts() {
        let command = Command::Runtime(RuntimeCommand::Evaluate {
            expression: "1 + 1".to_string(),
            await_promise: true,
            return_by_value: true,
        });

        let (method, params) = command.into_parts().expect("parts");
        assert_eq!(method, "Runtime.evaluate");
        assert_eq!(
            params,
            json!({"expression": "1 + 1", "awaitPromise": true, "returnByValue": true})
        );
    }

    #[test]
    fn test_unit_command_gets_empty_params() {
        let (method, params) = Command::Overlay(OverlayCommand::HideHighlight)
            .into_parts()
            .expect("parts");

        assert_eq!(method, "Overlay.hideHighlight");
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_screenshot_omits_missing_quality() {
        let (_, params) = Command::Page(PageCommand::CaptureScreenshot {
            format: "png".to_string(),
            quality: None,
            capture_beyond_viewport: false,
            from_surface: true,
        })
        .into_parts()
        .expect("parts");

        assert!(params.get("quality").is_none());
        assert_eq!(params["captureBeyondViewport"], false);
        assert_eq!(params["fromSurface"], true);
    }

    #[test]
    fn test_node_ids_serialize_as_numbers() {
        let (method, params) = Command::Dom(DomCommand::QuerySelector {
            node_id: NodeId::new(1),
            selector: "#main".to_string(),
        })
        .into_parts()
        .expect("parts");

        assert_eq!(method, "DOM.querySelector");
        assert_eq!(params, json!({"nodeId": 1, "selector": "#main"}));
    }

    #[test]
    fn test_key_event_type_field() {
        let (_, params) = Command::Input(InputCommand::DispatchKeyEvent {
            event_type: "keyDown".to_string(),
            key: "Enter".to_string(),
            code: "Enter".to_string(),
            text: Some("\r".to_string()),
            windows_virtual_key_code: Some(13),
            modifiers: 0,
        })
        .into_parts()
        .expect("parts");

        assert_eq!(params["type"], "keyDown");
        assert_eq!(params["windowsVirtualKeyCode"], 13);
    }
}
