//! Navigation, DOM, input and accessibility commands.

use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::NodeId;
use crate::protocol::{
    AccessibilityCommand, CallArgument, Command, DomCommand, EvaluateResult, InputCommand,
    PageCommand, RemoteObject, RuntimeCommand, methods,
};

use super::ConnectionManager;

// ============================================================================
// KeyPress
// ============================================================================

/// A single key stroke, sent as key-down then key-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPress {
    /// DOM `key` value (`Enter`, `a`, `ArrowDown`, ...).
    pub key: String,
    /// DOM `code` value (`Enter`, `KeyA`, `ArrowDown`, ...).
    pub code: String,
    /// Text the key produces, if any.
    pub text: Option<String>,
    /// Windows virtual key code.
    pub windows_virtual_key_code: Option<u32>,
    /// Modifier bit field (Alt=1, Ctrl=2, Meta=4, Shift=8).
    pub modifiers: u32,
}

impl KeyPress {
    /// Creates a key press without text or modifiers.
    #[must_use]
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    /// Sets the produced text.
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the Windows virtual key code.
    #[inline]
    #[must_use]
    pub fn with_key_code(mut self, code: u32) -> Self {
        self.windows_virtual_key_code = Some(code);
        self
    }

    /// Sets the modifier bit field.
    #[inline]
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    fn event(&self, event_type: &str, text: Option<String>) -> Command {
        Command::Input(InputCommand::DispatchKeyEvent {
            event_type: event_type.to_string(),
            key: self.key.clone(),
            code: self.code.clone(),
            text,
            windows_virtual_key_code: self.windows_virtual_key_code,
            modifiers: self.modifiers,
        })
    }
}

// ============================================================================
// ConnectionManager - Navigation
// ============================================================================

impl ConnectionManager {
    /// Navigates the page to `url`.
    ///
    /// With `wait_for_load`, also waits up to that long for the page `load`
    /// event. The wait races a one-shot listener against a timer; the
    /// navigation command itself is never cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Navigation`] if the page rejects the URL,
    /// [`Error::Timeout`] if `load` does not fire in time, or a connection
    /// error.
    pub async fn navigate(&self, url: &str, wait_for_load: Option<Duration>) -> Result<()> {
        debug!(url, ?wait_for_load, "Navigating");

        let Some(limit) = wait_for_load else {
            return self.navigate_once(url).await;
        };

        let key = self.unique_key("load-wait");
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.dispatcher()
            .register(methods::LOAD_EVENT_FIRED, key.clone(), move |_| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(());
                }
                Ok(())
            });

        let outcome = async {
            self.navigate_once(url).await?;
            match tokio::time::timeout(limit, rx).await {
                Ok(received) => Ok(received?),
                Err(_) => Err(Error::timeout(
                    format!("waiting for load of {url}"),
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                )),
            }
        }
        .await;

        self.dispatcher().unregister(methods::LOAD_EVENT_FIRED, &key);
        outcome
    }

    async fn navigate_once(&self, url: &str) -> Result<()> {
        let result = self
            .execute(Command::Page(PageCommand::Navigate {
                url: url.to_string(),
            }))
            .await?;

        match result.get("errorText").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => Err(Error::navigation(url, text)),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// ConnectionManager - DOM
// ============================================================================

impl ConnectionManager {
    /// Returns the root document node.
    ///
    /// # Errors
    ///
    /// Returns a connection error, or [`Error::Protocol`] if the result has
    /// no root node id.
    pub async fn document_root(&self) -> Result<NodeId> {
        self.ensure_domain("DOM").await?;

        let result = self
            .execute(Command::Dom(DomCommand::GetDocument { depth: 0 }))
            .await?;

        result
            .pointer("/root/nodeId")
            .and_then(Value::as_i64)
            .map(NodeId::new)
            .ok_or_else(|| Error::protocol("DOM.getDocument returned no root node"))
    }

    /// Returns the first element under the document matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns a connection error, including for malformed selectors.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let root = self.document_root().await?;

        let result = self
            .execute(Command::Dom(DomCommand::QuerySelector {
                node_id: root,
                selector: selector.to_string(),
            }))
            .await?;

        Ok(node_id_of(&result))
    }

    /// Returns a remote object handle for a node.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the node is unknown.
    pub async fn resolve_node(&self, node_id: NodeId) -> Result<RemoteObject> {
        let result = self
            .execute(Command::Dom(DomCommand::ResolveNode { node_id }))
            .await?;

        let object = result
            .get("object")
            .cloned()
            .ok_or_else(|| Error::protocol("DOM.resolveNode returned no object"))?;
        Ok(serde_json::from_value(object)?)
    }

    /// Returns the node id for a remote object handle, if it is a node.
    ///
    /// # Errors
    ///
    /// Returns a connection error.
    pub async fn request_node(&self, object_id: &str) -> Result<Option<NodeId>> {
        self.ensure_domain("DOM").await?;

        let result = self
            .execute(Command::Dom(DomCommand::RequestNode {
                object_id: object_id.to_string(),
            }))
            .await?;

        Ok(node_id_of(&result))
    }

    /// Returns the protocol description of a node.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the node is unknown.
    pub async fn describe_node(&self, node_id: NodeId) -> Result<Value> {
        let mut result = self
            .execute(Command::Dom(DomCommand::DescribeNode { node_id, depth: 0 }))
            .await?;

        Ok(result
            .get_mut("node")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Calls `declaration` with `this` bound to `object_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if the function threw, or a connection
    /// error.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        declaration: &str,
        arguments: Vec<CallArgument>,
    ) -> Result<RemoteObject> {
        let result: EvaluateResult = self
            .execute_as(Command::Runtime(RuntimeCommand::CallFunctionOn {
                function_declaration: declaration.to_string(),
                object_id: object_id.to_string(),
                arguments,
                return_by_value: true,
                await_promise: false,
            }))
            .await?;

        if let Some(details) = result.exception_details {
            return Err(Error::evaluation(details.message()));
        }
        Ok(result.result)
    }

    /// Releases a remote object handle.
    ///
    /// # Errors
    ///
    /// Returns a connection error.
    pub async fn release_object(&self, object_id: &str) -> Result<()> {
        self.execute(Command::Runtime(RuntimeCommand::ReleaseObject {
            object_id: object_id.to_string(),
        }))
        .await?;
        Ok(())
    }
}

/// Reads a non-null `nodeId` from a DOM result.
fn node_id_of(result: &Value) -> Option<NodeId> {
    result
        .get("nodeId")
        .and_then(Value::as_i64)
        .map(NodeId::new)
        .filter(|id| !id.is_null())
}

// ============================================================================
// ConnectionManager - Accessibility & Input
// ============================================================================

impl ConnectionManager {
    /// Returns the page's full accessibility tree as raw nodes.
    ///
    /// # Errors
    ///
    /// Returns a connection error.
    pub async fn accessibility_tree(&self) -> Result<Vec<Value>> {
        self.ensure_domain("Accessibility").await?;

        let mut result = self
            .execute(Command::Accessibility(AccessibilityCommand::GetFullAxTree))
            .await?;

        match result.get_mut("nodes").map(Value::take) {
            Some(Value::Array(nodes)) => Ok(nodes),
            _ => Ok(Vec::new()),
        }
    }

    /// Inserts text at the focused element without key events.
    ///
    /// # Errors
    ///
    /// Returns a connection error.
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.execute(Command::Input(InputCommand::InsertText {
            text: text.to_string(),
        }))
        .await?;
        Ok(())
    }

    /// Sends a key-down and key-up for `key`.
    ///
    /// # Errors
    ///
    /// Returns a connection error.
    pub async fn dispatch_key(&self, key: &KeyPress) -> Result<()> {
        debug!(key = %key.key, code = %key.code, "Dispatching key");

        let down = if key.text.is_some() { "keyDown" } else { "rawKeyDown" };
        self.execute(key.event(down, key.text.clone())).await?;
        self.execute(key.event("keyUp", None)).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    use crate::testing::MockConnector;

    fn manager(mock: &Arc<MockConnector>) -> ConnectionManager {
        ConnectionManager::with_connector(mock.clone(), 50)
    }

    #[tokio::test]
    async fn test_navigate_error_text() {
        let mock = MockConnector::new();
        mock.respond("Page.navigate", json!({"frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED"}));
        let manager = manager(&mock);

        let err = manager.navigate("https://nope.invalid", None).await.unwrap_err();
        assert!(matches!(err, Error::Navigation { .. }));
        assert!(err.to_string().contains("net::ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn test_navigate_waits_for_load_event() {
        let mock = MockConnector::new();
        mock.respond("Page.navigate", json!({"frameId": "F"}));
        let manager = manager(&mock);
        manager.connect().await.expect("connect");

        let emitter = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                mock.emit(methods::LOAD_EVENT_FIRED, json!({"timestamp": 3.0}));
            })
        };

        manager
            .navigate("https://example.com", Some(Duration::from_secs(5)))
            .await
            .expect("loaded");
        emitter.await.expect("join");

        assert_eq!(manager.dispatcher().listener_count(methods::LOAD_EVENT_FIRED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_load_timeout() {
        let mock = MockConnector::new();
        let manager = manager(&mock);

        let err = manager
            .navigate("https://example.com", Some(Duration::from_millis(200)))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(manager.dispatcher().listener_count(methods::LOAD_EVENT_FIRED), 0);
    }

    #[tokio::test]
    async fn test_query_selector() {
        let mock = MockConnector::new();
        mock.respond("DOM.getDocument", json!({"root": {"nodeId": 1}}));
        mock.respond_once("DOM.querySelector", json!({"nodeId": 42}));
        mock.respond("DOM.querySelector", json!({"nodeId": 0}));
        let manager = manager(&mock);

        assert_eq!(manager.query_selector("#main").await.expect("query"), Some(NodeId::new(42)));
        assert_eq!(manager.query_selector("#missing").await.expect("query"), None);

        let params = mock.last_params("DOM.querySelector").expect("sent");
        assert_eq!(params, json!({"nodeId": 1, "selector": "#missing"}));
        assert_eq!(mock.count("DOM.enable"), 1);
    }

    #[tokio::test]
    async fn test_dispatch_key_sends_down_then_up() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        manager.connect().await.expect("connect");
        mock.clear_calls();

        manager
            .dispatch_key(&KeyPress::new("a", "KeyA").with_text("a").with_key_code(65))
            .await
            .expect("key");

        assert_eq!(mock.count("Input.dispatchKeyEvent"), 2);
        let up = mock.last_params("Input.dispatchKeyEvent").expect("sent");
        assert_eq!(
            up,
            json!({"type": "keyUp", "key": "a", "code": "KeyA", "windowsVirtualKeyCode": 65, "modifiers": 0})
        );
    }

    #[tokio::test]
    async fn test_describe_node_returns_node() {
        let mock = MockConnector::new();
        mock.respond_once(
            "DOM.describeNode",
            json!({"node": {"nodeId": 7, "nodeName": "BUTTON", "localName": "button"}}),
        );
        mock.respond("DOM.describeNode", json!({}));
        let manager = manager(&mock);

        let node = manager.describe_node(NodeId::new(7)).await.expect("describe");
        assert_eq!(node["nodeName"], "BUTTON");
        assert_eq!(
            mock.last_params("DOM.describeNode").expect("sent"),
            json!({"nodeId": 7, "depth": 0})
        );

        let missing = manager.describe_node(NodeId::new(8)).await.expect("describe");
        assert_eq!(missing, Value::Null);
    }

    #[tokio::test]
    async fn test_insert_text_sends_text() {
        let mock = MockConnector::new();
        let manager = manager(&mock);
        manager.connect().await.expect("connect");
        mock.clear_calls();

        manager.insert_text("héllo\nworld").await.expect("insert");

        assert_eq!(mock.count("Input.insertText"), 1);
        assert_eq!(
            mock.last_params("Input.insertText").expect("sent"),
            json!({"text": "héllo\nworld"})
        );
    }

    #[tokio::test]
    async fn test_accessibility_tree() {
        let mock = MockConnector::new();
        mock.respond(
            "Accessibility.getFullAXTree",
            json!({"nodes": [{"nodeId": "1", "role": {"type": "role", "value": "RootWebArea"}}]}),
        );
        let manager = manager(&mock);

        let nodes = manager.accessibility_tree().await.expect("tree");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["role"]["value"], "RootWebArea");
    }
}
