//! Expression evaluation results.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::protocol::RemoteObject;

// ============================================================================
// EvaluationResult
// ============================================================================

/// Outcome of a successful page-side evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    /// Type tag of the produced value.
    #[serde(rename = "type")]
    pub kind: String,

    /// Textual rendering, see [`render_value`].
    pub value: String,

    /// Description reported by the page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EvaluationResult {
    /// Builds a result from a remote object.
    #[must_use]
    pub fn from_remote(object: &RemoteObject) -> Self {
        Self {
            kind: object.kind.clone(),
            value: render_value(object),
            description: object.description.clone(),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Renders a remote object as text.
///
/// Takes the first available of: the concrete value (strings as-is, objects
/// and arrays as JSON, other primitives in their literal form), the
/// unserializable form (`NaN`, `Infinity`, `-0`, bigints), the description,
/// the type tag, and finally `"undefined"`.
#[must_use]
pub fn render_value(object: &RemoteObject) -> String {
    if let Some(value) = &object.value {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    object
        .unserializable_value
        .clone()
        .or_else(|| object.description.clone())
        .or_else(|| (!object.kind.is_empty()).then(|| object.kind.clone()))
        .unwrap_or_else(|| "undefined".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn remote(value: Value) -> RemoteObject {
        serde_json::from_value(value).expect("remote object")
    }

    #[test]
    fn test_render_concrete_values() {
        assert_eq!(render_value(&remote(json!({"type": "string", "value": "hi"}))), "hi");
        assert_eq!(render_value(&remote(json!({"type": "number", "value": 2}))), "2");
        assert_eq!(render_value(&remote(json!({"type": "boolean", "value": false}))), "false");
        assert_eq!(
            render_value(&remote(json!({"type": "object", "value": {"a": [1, 2]}}))),
            r#"{"a":[1,2]}"#
        );
        assert_eq!(
            render_value(&remote(json!({"type": "object", "subtype": "null", "value": null}))),
            "null"
        );
    }

    #[test]
    fn test_render_fallback_chain() {
        assert_eq!(
            render_value(&remote(json!({"type": "number", "unserializableValue": "NaN", "description": "NaN"}))),
            "NaN"
        );
        assert_eq!(
            render_value(&remote(json!({"type": "function", "description": "function f() {}"}))),
            "function f() {}"
        );
        assert_eq!(render_value(&remote(json!({"type": "undefined"}))), "undefined");
        assert_eq!(render_value(&remote(json!({"type": "symbol"}))), "symbol");
        assert_eq!(render_value(&RemoteObject::default()), "undefined");
    }

    #[test]
    fn test_result_serializes_type_field() {
        let result = EvaluationResult::from_remote(&remote(
            json!({"type": "object", "className": "Window", "description": "Window"}),
        ));
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json, json!({"type": "object", "value": "Window", "description": "Window"}));
    }
}
