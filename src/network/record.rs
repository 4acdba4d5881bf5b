//! Correlated per-request records.
//!
//! A record is filled in piece by piece from the four lifecycle events of one
//! request id. Events may arrive in any order; each one only writes the
//! fields it actually carries.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identifiers::NetworkRequestId;
use crate::protocol::event::{LoadingFailed, LoadingFinished, RequestWillBeSent, ResponseReceived};
use crate::session::normalize_timestamp;

// ============================================================================
// NetworkRequestRecord
// ============================================================================

/// Everything observed about one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequestRecord {
    /// Request id assigned by the network agent.
    pub request_id: NetworkRequestId,

    /// Request URL (the final one after redirects).
    pub url: Option<String>,

    /// HTTP method.
    pub method: Option<String>,

    /// Resource type (`Document`, `XHR`, `Fetch`, `Script`, ...).
    pub resource_type: Option<String>,

    /// HTTP status code.
    pub status: Option<u16>,

    /// HTTP status text.
    pub status_text: Option<String>,

    /// Response MIME type.
    pub mime_type: Option<String>,

    /// Request headers.
    pub request_headers: BTreeMap<String, String>,

    /// Response headers.
    pub response_headers: BTreeMap<String, String>,

    /// Failure reason (`net::ERR_FAILED`, ...).
    pub error_text: Option<String>,

    /// Bytes received over the wire.
    pub encoded_data_length: Option<f64>,

    /// Served from a cache or service worker.
    pub from_cache: bool,

    /// Cancelled before completion.
    pub canceled: bool,

    /// Reason the request was blocked, if it was.
    pub blocked_reason: Option<String>,

    /// Redirects followed so far.
    pub redirect_count: u32,

    /// Request carries a body.
    pub has_post_data: bool,

    /// Start time in milliseconds.
    pub started_at: Option<f64>,

    /// Response time in milliseconds.
    pub responded_at: Option<f64>,

    /// Finish or failure time in milliseconds.
    pub finished_at: Option<f64>,
}

impl NetworkRequestRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new(request_id: NetworkRequestId) -> Self {
        Self {
            request_id,
            url: None,
            method: None,
            resource_type: None,
            status: None,
            status_text: None,
            mime_type: None,
            request_headers: BTreeMap::new(),
            response_headers: BTreeMap::new(),
            error_text: None,
            encoded_data_length: None,
            from_cache: false,
            canceled: false,
            blocked_reason: None,
            redirect_count: 0,
            has_post_data: false,
            started_at: None,
            responded_at: None,
            finished_at: None,
        }
    }

    /// Returns `true` if the request failed (status >= 400 or an error text).
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.is_some_and(|status| status >= 400)
            || self.error_text.as_deref().is_some_and(|text| !text.is_empty())
    }

    /// Returns `true` once the request finished or failed.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Merges a request-will-be-sent event.
    pub fn apply_request(&mut self, event: &RequestWillBeSent) {
        if event.redirect_response.is_some() {
            self.redirect_count += 1;
        }

        set_text(&mut self.url, &event.request.url);
        set_text(&mut self.method, &event.request.method);
        set_option(&mut self.resource_type, event.resource_type.as_ref());
        merge_headers(&mut self.request_headers, &event.request.headers);

        if event.request.has_post_data.unwrap_or(false) {
            self.has_post_data = true;
        }

        if self.started_at.is_none()
            && let Some(ts) = event.wall_time.or(event.timestamp)
        {
            self.started_at = Some(normalize_timestamp(ts));
        }
    }

    /// Merges a response-received event.
    pub fn apply_response(&mut self, event: &ResponseReceived) {
        let response = &event.response;

        set_text(&mut self.url, &response.url);
        set_option(&mut self.resource_type, event.resource_type.as_ref());
        if response.status != 0 {
            self.status = Some(response.status);
        }
        set_text(&mut self.status_text, &response.status_text);
        set_option(&mut self.mime_type, response.mime_type.as_ref());
        merge_headers(&mut self.response_headers, &response.headers);

        if response.from_cache() {
            self.from_cache = true;
        }
        if response.encoded_data_length.is_some() {
            self.encoded_data_length = response.encoded_data_length;
        }
        if let Some(ts) = event.timestamp {
            self.responded_at = Some(normalize_timestamp(ts));
        }
    }

    /// Merges a loading-finished event.
    pub fn apply_finished(&mut self, event: &LoadingFinished) {
        if event.encoded_data_length.is_some() {
            self.encoded_data_length = event.encoded_data_length;
        }
        if let Some(ts) = event.timestamp {
            self.finished_at = Some(normalize_timestamp(ts));
        }
    }

    /// Merges a loading-failed event.
    pub fn apply_failed(&mut self, event: &LoadingFailed) {
        set_text(&mut self.error_text, &event.error_text);
        set_option(&mut self.resource_type, event.resource_type.as_ref());
        set_option(&mut self.blocked_reason, event.blocked_reason.as_ref());

        if event.canceled.unwrap_or(false) {
            self.canceled = true;
        }
        if let Some(ts) = event.timestamp {
            self.finished_at = Some(normalize_timestamp(ts));
        }
    }
}

// ============================================================================
// Merge Helpers
// ============================================================================

fn set_text(field: &mut Option<String>, value: &str) {
    if !value.is_empty() {
        *field = Some(value.to_string());
    }
}

fn set_option(field: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *field = Some(value.clone());
    }
}

fn merge_headers(target: &mut BTreeMap<String, String>, headers: &Map<String, Value>) {
    for (name, value) in headers {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        target.insert(name.clone(), value);
    }
}

// ============================================================================
// Tests
// ============================================================================
