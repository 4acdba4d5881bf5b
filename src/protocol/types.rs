//! Payload types shared by command results and events.
//!
//! Only the fields the session layer reads are modelled; unknown fields are
//! ignored on deserialization.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

// ============================================================================
// Helpers
// ============================================================================

/// Keeps an explicit JSON `null` as `Some(Value::Null)`.
///
/// Plain `Option<Value>` folds `null` into `None`, which would lose the
/// difference between "no value" and "the value is null".
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// Runtime
// ============================================================================

/// Mirror of a page-side JavaScript value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Type tag (`object`, `string`, `number`, `undefined`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Object subtype (`null`, `array`, `node`, `error`, ...).
    #[serde(default)]
    pub subtype: Option<String>,

    /// Constructor name for objects.
    #[serde(default)]
    pub class_name: Option<String>,

    /// Serialized value, present for primitives and by-value results.
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,

    /// Textual form of values JSON cannot carry (`NaN`, `-0`, `Infinity`, bigints).
    #[serde(default)]
    pub unserializable_value: Option<String>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Handle for by-reference results.
    #[serde(default)]
    pub object_id: Option<String>,
}

/// Location of one frame in a page-side stack trace.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Function name, empty for anonymous code.
    #[serde(default)]
    pub function_name: String,

    /// Script URL.
    #[serde(default)]
    pub url: String,

    /// Zero-based line.
    #[serde(default)]
    pub line_number: i64,

    /// Zero-based column.
    #[serde(default)]
    pub column_number: i64,
}

/// Page-side stack trace.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    /// Frames, innermost first.
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
}

impl StackTrace {
    /// Renders the trace as `    at fn (url:line:col)` lines.
    #[must_use]
    pub fn render(&self) -> String {
        self.call_frames
            .iter()
            .map(|frame| {
                let name = if frame.function_name.is_empty() {
                    "<anonymous>"
                } else {
                    frame.function_name.as_str()
                };
                format!(
                    "    at {} ({}:{}:{})",
                    name, frame.url, frame.line_number, frame.column_number
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Details of an exception thrown in the page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Short message, usually `Uncaught` or `Uncaught (in promise)`.
    #[serde(default)]
    pub text: String,

    /// Zero-based line.
    #[serde(default)]
    pub line_number: Option<i64>,

    /// Zero-based column.
    #[serde(default)]
    pub column_number: Option<i64>,

    /// Script URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Stack at throw time.
    #[serde(default)]
    pub stack_trace: Option<StackTrace>,

    /// The thrown value.
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Composes a message from description, value or text, with a
    /// `url:line:col` suffix when the location is known.
    #[must_use]
    pub fn message(&self) -> String {
        let exception = self.exception.as_ref();
        let base = exception
            .and_then(|e| e.description.clone())
            .or_else(|| {
                exception
                    .and_then(|e| e.value.as_ref())
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                if self.text.is_empty() {
                    "Uncaught exception".to_string()
                } else {
                    self.text.clone()
                }
            });

        match self.url.as_deref() {
            Some(url) if !url.is_empty() => format!(
                "{} ({}:{}:{})",
                base,
                url,
                self.line_number.unwrap_or(0),
                self.column_number.unwrap_or(0)
            ),
            _ => base,
        }
    }
}

/// Result of `Runtime.evaluate` and `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// The produced value.
    pub result: RemoteObject,

    /// Present when the expression threw.
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

// ============================================================================
// Network
// ============================================================================

/// Request half of a network lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Request URL.
    #[serde(default)]
    pub url: String,

    /// HTTP method.
    #[serde(default)]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: Map<String, Value>,

    /// Whether the request carries a body.
    #[serde(default)]
    pub has_post_data: Option<bool>,
}

/// Response half of a network lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// Response URL.
    #[serde(default)]
    pub url: String,

    /// HTTP status code.
    #[serde(default)]
    pub status: u16,

    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,

    /// Response headers.
    #[serde(default)]
    pub headers: Map<String, Value>,

    /// Resource MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Served from the disk cache.
    #[serde(default)]
    pub from_disk_cache: Option<bool>,

    /// Served from the prefetch cache.
    #[serde(default)]
    pub from_prefetch_cache: Option<bool>,

    /// Served by a service worker.
    #[serde(default)]
    pub from_service_worker: Option<bool>,

    /// Bytes received so far.
    #[serde(default)]
    pub encoded_data_length: Option<f64>,
}

impl ResponsePayload {
    /// Returns `true` if any cache served this response.
    #[inline]
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.from_disk_cache.unwrap_or(false)
            || self.from_prefetch_cache.unwrap_or(false)
            || self.from_service_worker.unwrap_or(false)
    }
}

/// Result of `Network.getResponseBody`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    /// Body text, base64 when `base64_encoded`.
    pub body: String,

    /// Whether `body` is base64.
    #[serde(default)]
    pub base64_encoded: bool,
}

// ============================================================================
// Tests
// ============================================================================
