//! Session façade.
//!
//! An [`Inspector`] wires one [`ConnectionManager`] to the three subsystems
//! that share it. Each subsystem only talks to the manager, never to the
//! others.
//!
//! # Example
//!
//! ```ignore
//! use devtools_session::{Inspector, SessionConfig, SubscribeOptions};
//!
//! let config = SessionConfig::new("ws://127.0.0.1:9222/devtools/page/ABC")?;
//! let (inspector, mut notifications) = Inspector::with_channel(&config);
//!
//! // A failed first connect is fatal for the caller.
//! inspector.start().await?;
//! inspector.console().subscribe(SubscribeOptions::default()).await?;
//!
//! while let Some(notification) = notifications.recv().await {
//!     println!("{}: {}", notification.level.as_str(), notification.text);
//! }
//!
//! inspector.dispose().await;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use crate::config::SessionConfig;
use crate::console::{ConsoleNotification, ConsoleStreamManager, NotificationSink};
use crate::error::Result;
use crate::network::NetworkRecorder;
use crate::overlay::OverlayManager;
use crate::session::ConnectionManager;

/// One page session and its subsystems.
#[derive(Debug, Clone)]
pub struct Inspector {
    manager: ConnectionManager,
    network: NetworkRecorder,
    console: ConsoleStreamManager,
    overlay: OverlayManager,
}

impl Inspector {
    /// Creates an inspector for `config`, streaming console output to `sink`.
    #[must_use]
    pub fn new(config: &SessionConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self::from_manager(ConnectionManager::new(config), sink)
    }

    /// Creates an inspector whose console output lands in the returned
    /// receiver.
    #[must_use]
    pub fn with_channel(config: &SessionConfig) -> (Self, UnboundedReceiver<ConsoleNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(config, Arc::new(tx)), rx)
    }

    /// Builds the subsystems around an existing manager.
    #[must_use]
    pub fn from_manager(manager: ConnectionManager, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            network: NetworkRecorder::new(&manager),
            console: ConsoleStreamManager::new(&manager, sink),
            overlay: OverlayManager::new(&manager),
            manager,
        }
    }

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns the connect or setup error unchanged.
    pub async fn start(&self) -> Result<()> {
        self.manager.connect().await?;
        info!(epoch = self.manager.epoch(), "Inspector started");
        Ok(())
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Returns the network recorder.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkRecorder {
        &self.network
    }

    /// Returns the console stream.
    #[inline]
    #[must_use]
    pub fn console(&self) -> &ConsoleStreamManager {
        &self.console
    }

    /// Returns the overlay.
    #[inline]
    #[must_use]
    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    /// Hides the overlay, stops the console stream and closes the
    /// connection.
    ///
    /// Safe to call repeatedly or before [`start`](Self::start).
    pub async fn dispose(&self) {
        self.overlay.dispose().await;
        self.console.unsubscribe();
        self.network.stop();
        self.manager.dispose().await;
        info!("Inspector disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::console::SubscribeOptions;
    use crate::identifiers::NodeId;
    use crate::overlay::HighlightOptions;
    use crate::protocol::methods;
    use crate::testing::MockConnector;

    fn inspector(mock: &Arc<MockConnector>) -> (Inspector, UnboundedReceiver<ConsoleNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::with_connector(mock.clone(), 50);
        (Inspector::from_manager(manager, Arc::new(tx)), rx)
    }

    #[tokio::test]
    async fn test_start_failure_is_returned() {
        let mock = MockConnector::new();
        mock.refuse_connections(true);
        let (inspector, _rx) = inspector(&mock);

        let err = inspector.start().await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_subsystems_share_one_connection() {
        let mock = MockConnector::new();
        let (inspector, _rx) = inspector(&mock);

        let (network, console) = tokio::join!(
            inspector.network().start(),
            inspector.console().subscribe(SubscribeOptions::default()),
        );
        network.expect("network");
        console.expect("console");

        assert_eq!(mock.connect_count(), 1);
        inspector.dispose().await;
    }

    #[tokio::test]
    async fn test_dispose_tears_everything_down() {
        let mock = MockConnector::new();
        let (inspector, mut rx) = inspector(&mock);
        inspector.start().await.expect("start");
        inspector
            .console()
            .subscribe(SubscribeOptions::default())
            .await
            .expect("subscribe");
        inspector
            .overlay()
            .highlight(HighlightOptions::node(NodeId::new(2)).with_screenshot(false))
            .await
            .expect("highlight");

        inspector.dispose().await;

        assert!(!inspector.overlay().is_active());
        assert!(!inspector.overlay().has_pending_timer());
        assert!(!inspector.console().is_active());
        assert!(!inspector.session().is_connected());
        assert_eq!(mock.close_count(), 1);
        assert_eq!(
            inspector
                .session()
                .dispatcher()
                .listener_count(methods::CONSOLE_API_CALLED),
            0
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispose_when_idle() {
        let mock = MockConnector::new();
        let (inspector, _rx) = inspector(&mock);

        inspector.dispose().await;
        inspector.dispose().await;

        assert_eq!(mock.connect_count(), 0);
        assert_eq!(mock.close_count(), 0);
    }

    #[tokio::test]
    async fn test_console_events_reach_channel() {
        let mock = MockConnector::new();
        let (inspector, mut rx) = inspector(&mock);
        inspector
            .console()
            .subscribe(SubscribeOptions::default())
            .await
            .expect("subscribe");

        mock.emit(
            methods::CONSOLE_API_CALLED,
            json!({"type": "warning", "args": [{"type": "string", "value": "careful"}], "timestamp": 1.0}),
        );

        let notification = rx.recv().await.expect("notification");
        assert_eq!(notification.text, "careful");
        inspector.dispose().await;
    }
}
