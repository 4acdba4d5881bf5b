//! Network request recording.
//!
//! A [`NetworkRecorder`] listens to the request lifecycle events of the page
//! and folds them into one [`NetworkRequestRecord`] per request id, kept in
//! first-seen order.
//!
//! # Capturing
//!
//! Events are only recorded while capturing. While stopped they are dropped
//! on arrival, so nothing recorded before `start` or after `stop` shows up
//! later. `start` always begins from an empty record set.
//!
//! Capture belongs to the connection it was started on. Once that
//! connection ends the recorder reports itself stopped and ignores traffic
//! from any later connection until `start` is called again. Records from
//! the ended capture are kept.
//!
//! Records are not capped. A long capture grows until the caller runs
//! `clear` or `start`.
//!
//! # Example
//!
//! ```ignore
//! let recorder = NetworkRecorder::new(&manager);
//! recorder.start().await?;
//!
//! manager.navigate("https://example.com", None).await?;
//!
//! for record in recorder.list(&RequestFilter::default().only_failed(true)) {
//!     println!("{:?} {:?}", record.status, record.url);
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Request listing filter.
pub mod filter;

/// Correlated request records.
pub mod record;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BestEffort, Result};
use crate::identifiers::NetworkRequestId;
use crate::protocol::{Command, Event, NetworkCommand, ParsedEvent, ResponseBody, methods};
use crate::session::ConnectionManager;

// ============================================================================
// Re-exports
// ============================================================================

pub use filter::RequestFilter;
pub use record::NetworkRequestRecord;

// ============================================================================
// Constants
// ============================================================================

/// Listener key shared by the recorder's four handlers.
const LISTENER_KEY: &str = "network-recorder";

/// Lifecycle events the recorder consumes.
const LIFECYCLE_EVENTS: [&str; 4] = [
    methods::REQUEST_WILL_BE_SENT,
    methods::RESPONSE_RECEIVED,
    methods::LOADING_FINISHED,
    methods::LOADING_FAILED,
];

// ============================================================================
// RecorderState
// ============================================================================

#[derive(Debug, Default)]
struct RecorderState {
    /// Connection epoch capture was started in.
    capture_epoch: Option<u64>,
    records: FxHashMap<NetworkRequestId, NetworkRequestRecord>,
    order: Vec<NetworkRequestId>,
}

impl RecorderState {
    /// Returns the record for `id`, creating it on first sight.
    fn record_mut(&mut self, id: &NetworkRequestId) -> &mut NetworkRequestRecord {
        if !self.records.contains_key(id) {
            self.order.push(id.clone());
        }
        self.records
            .entry(id.clone())
            .or_insert_with(|| NetworkRequestRecord::new(id.clone()))
    }

    fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    fn ordered(&self) -> impl Iterator<Item = &NetworkRequestRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    fn is_capturing_in(&self, epoch: u64) -> bool {
        self.capture_epoch == Some(epoch)
    }

    /// Merges one lifecycle event seen in `epoch`. Dropped entirely while
    /// not capturing in that epoch.
    fn ingest(&mut self, epoch: u64, event: &Event) -> Result<()> {
        if !self.is_capturing_in(epoch) {
            return Ok(());
        }

        match event.parse()? {
            ParsedEvent::RequestWillBeSent(e) => self.record_mut(&e.request_id).apply_request(&e),
            ParsedEvent::ResponseReceived(e) => self.record_mut(&e.request_id).apply_response(&e),
            ParsedEvent::LoadingFinished(e) => self.record_mut(&e.request_id).apply_finished(&e),
            ParsedEvent::LoadingFailed(e) => self.record_mut(&e.request_id).apply_failed(&e),
            _ => {}
        }
        Ok(())
    }
}

// ============================================================================
// NetworkRecorder
// ============================================================================

/// Records request lifecycles for one session.
///
/// The record set has no size limit; [`clear`](Self::clear) and
/// [`start`](Self::start) are the only ways to shrink it.
#[derive(Clone)]
pub struct NetworkRecorder {
    manager: ConnectionManager,
    state: Arc<Mutex<RecorderState>>,
}

impl std::fmt::Debug for NetworkRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NetworkRecorder")
            .field("capture_epoch", &state.capture_epoch)
            .field("records", &state.order.len())
            .finish_non_exhaustive()
    }
}

impl NetworkRecorder {
    /// Creates a stopped recorder and registers its listeners on `manager`.
    #[must_use]
    pub fn new(manager: &ConnectionManager) -> Self {
        let state = Arc::new(Mutex::new(RecorderState::default()));

        for method in LIFECYCLE_EVENTS {
            let state = Arc::clone(&state);
            let session = manager.downgrade();
            manager.dispatcher().register(method, LISTENER_KEY, move |event| {
                let Some(session) = session.upgrade() else {
                    return Ok(());
                };
                let epoch = session.current_epoch();
                state.lock().ingest(epoch, event)
            });
        }

        Self {
            manager: manager.clone(),
            state,
        }
    }

    /// Enables network events, drops all records and starts capturing.
    ///
    /// # Errors
    ///
    /// Returns a connection error if `Network.enable` fails; capturing is
    /// left unchanged in that case.
    pub async fn start(&self) -> Result<()> {
        self.manager.ensure_domain("Network").await?;

        let epoch = self.manager.epoch();
        let mut state = self.state.lock();
        state.clear();
        state.capture_epoch = Some(epoch);
        info!("Network capture started");
        Ok(())
    }

    /// Stops capturing. Records are kept.
    pub fn stop(&self) {
        self.state.lock().capture_epoch = None;
        info!("Network capture stopped");
    }

    /// Drops all records. Capturing is unchanged.
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    /// Returns `true` while capturing on the current connection.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        let epoch = self.manager.epoch();
        self.state.lock().is_capturing_in(epoch)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all records in first-seen order.
    #[must_use]
    pub fn requests(&self) -> Vec<NetworkRequestRecord> {
        self.state.lock().ordered().cloned().collect()
    }

    /// Returns the first `filter.limit` records passing `filter`, in
    /// first-seen order.
    #[must_use]
    pub fn list(&self, filter: &RequestFilter) -> Vec<NetworkRequestRecord> {
        self.state
            .lock()
            .ordered()
            .filter(|record| filter.matches(record))
            .take(filter.limit)
            .cloned()
            .collect()
    }

    /// Returns the record for `request_id`.
    #[must_use]
    pub fn get(&self, request_id: &NetworkRequestId) -> Option<NetworkRequestRecord> {
        self.state.lock().records.get(request_id).cloned()
    }

    /// Fetches the response body of a request.
    ///
    /// Works whether or not capturing is on. Returns `None` if the body is
    /// unavailable; the failure is logged.
    pub async fn response_body(&self, request_id: &NetworkRequestId) -> Option<ResponseBody> {
        debug!(request_id = %request_id, "Fetching response body");

        self.manager
            .execute_as(Command::Network(NetworkCommand::GetResponseBody {
                request_id: request_id.clone(),
            }))
            .await
            .best_effort("fetch response body")
    }

    /// Fetches the body sent with a request.
    ///
    /// Returns `None` if there is none or it is unavailable; the failure is
    /// logged.
    pub async fn request_post_data(&self, request_id: &NetworkRequestId) -> Option<String> {
        debug!(request_id = %request_id, "Fetching request post data");

        let result = self
            .manager
            .execute(Command::Network(NetworkCommand::GetRequestPostData {
                request_id: request_id.clone(),
            }))
            .await
            .best_effort("fetch request post data")?;

        result
            .get("postData")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::MockConnector;

    async fn recorder() -> (Arc<MockConnector>, ConnectionManager, NetworkRecorder) {
        let mock = MockConnector::new();
        let manager = ConnectionManager::with_connector(mock.clone(), 100);
        let recorder = NetworkRecorder::new(&manager);
        recorder.start().await.expect("start");
        (mock, manager, recorder)
    }

    fn request(mock: &MockConnector, id: &str, method: &str, url: &str) {
        mock.emit(
            methods::REQUEST_WILL_BE_SENT,
            json!({"requestId": id, "request": {"url": url, "method": method}, "timestamp": 1.0, "type": "Fetch"}),
        );
    }

    fn response(mock: &MockConnector, id: &str, url: &str, status: u16) {
        mock.emit(
            methods::RESPONSE_RECEIVED,
            json!({"requestId": id, "timestamp": 1.1, "type": "Fetch", "response": {"url": url, "status": status}}),
        );
    }

    fn finished(mock: &MockConnector, id: &str) {
        mock.emit(
            methods::LOADING_FINISHED,
            json!({"requestId": id, "timestamp": 1.2, "encodedDataLength": 512.0}),
        );
    }

    #[tokio::test]
    async fn test_only_failed_listing() {
        let (mock, _manager, recorder) = recorder().await;

        request(&mock, "a", "GET", "https://x/a");
        response(&mock, "a", "https://x/a", 200);
        finished(&mock, "a");

        request(&mock, "b", "POST", "https://x/b");
        response(&mock, "b", "https://x/b", 500);
        mock.emit(
            methods::LOADING_FAILED,
            json!({"requestId": "b", "timestamp": 1.3, "errorText": "net::ERR_FAILED"}),
        );

        let failed = recorder.list(&RequestFilter::default().only_failed(true));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url.as_deref(), Some("https://x/b"));
        assert_eq!(failed[0].error_text.as_deref(), Some("net::ERR_FAILED"));

        assert_eq!(recorder.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_response_before_request_merges() {
        let (mock, _manager, recorder) = recorder().await;

        response(&mock, "r1", "https://x/late", 200);
        request(&mock, "r1", "GET", "https://x/late");

        let records = recorder.requests();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Some(200));
        assert_eq!(records[0].method.as_deref(), Some("GET"));
        assert_eq!(records[0].responded_at, Some(1100.0));
    }

    #[tokio::test]
    async fn test_stop_drops_events_and_start_resets() {
        let (mock, _manager, recorder) = recorder().await;

        request(&mock, "1", "GET", "https://x/1");
        recorder.stop();
        response(&mock, "1", "https://x/1", 404);
        request(&mock, "2", "GET", "https://x/2");

        let records = recorder.requests();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, None);

        recorder.start().await.expect("restart");
        assert!(recorder.is_empty());
        assert!(recorder.is_capturing());

        // start again without stop also resets
        request(&mock, "3", "GET", "https://x/3");
        recorder.start().await.expect("restart while capturing");
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_clear_bounds_growth_while_capturing() {
        let (mock, _manager, recorder) = recorder().await;

        for i in 0..50 {
            request(&mock, &i.to_string(), "GET", &format!("https://x/{i}"));
        }
        assert_eq!(recorder.len(), 50);

        recorder.clear();
        assert!(recorder.is_empty());
        assert!(recorder.is_capturing());

        request(&mock, "next", "GET", "https://x/next");
        assert_eq!(recorder.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_ends_capture() {
        let (mock, manager, recorder) = recorder().await;
        request(&mock, "before", "GET", "https://x/before");

        mock.disconnect();
        assert!(!recorder.is_capturing());

        manager.connect().await.expect("reconnect");
        request(&mock, "after", "GET", "https://x/after");

        assert!(!recorder.is_capturing());
        let records = recorder.requests();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url.as_deref(), Some("https://x/before"));

        recorder.start().await.expect("start on new connection");
        assert_eq!(mock.count("Network.enable"), 2);
        assert!(recorder.is_capturing());

        request(&mock, "fresh", "GET", "https://x/fresh");
        assert_eq!(recorder.len(), 1);
    }

    #[tokio::test]
    async fn test_list_keeps_first_seen_order_and_limit() {
        let (mock, _manager, recorder) = recorder().await;

        for i in 0..5 {
            request(&mock, &i.to_string(), if i % 2 == 0 { "GET" } else { "POST" }, &format!("https://x/{i}"));
        }

        let gets = recorder.list(&RequestFilter::default().with_methods(["get"]).with_limit(2));
        let urls: Vec<_> = gets.iter().filter_map(|r| r.url.clone()).collect();
        assert_eq!(urls, ["https://x/0", "https://x/2"]);
    }

    #[tokio::test]
    async fn test_events_before_start_are_ignored() {
        let mock = MockConnector::new();
        let manager = ConnectionManager::with_connector(mock.clone(), 100);
        let recorder = NetworkRecorder::new(&manager);
        manager.connect().await.expect("connect");

        request(&mock, "early", "GET", "https://x/early");
        assert!(recorder.is_empty());
        assert!(!recorder.is_capturing());
        assert_eq!(mock.count("Network.enable"), 0);

        recorder.start().await.expect("start");
        recorder.start().await.expect("start again");
        assert_eq!(mock.count("Network.enable"), 1);
        assert_eq!(manager.dispatcher().listener_count(methods::REQUEST_WILL_BE_SENT), 1);
    }

    #[tokio::test]
    async fn test_body_fetch_failure_returns_none() {
        let (mock, _manager, recorder) = recorder().await;
        let id = NetworkRequestId::new("gone");

        mock.fail("Network.getResponseBody", "No resource with given identifier found");
        assert!(recorder.response_body(&id).await.is_none());

        mock.respond("Network.getRequestPostData", json!({"postData": "a=1"}));
        assert_eq!(recorder.request_post_data(&id).await.as_deref(), Some("a=1"));

        recorder.stop();
        mock.respond("Network.getResponseBody", json!({"body": "eyJ9", "base64Encoded": true}));
        let body = recorder.response_body(&id).await.expect("body while stopped");
        assert!(body.base64_encoded);
    }
}
