//! LiveConnectionManager - Streaming + Status Channels
//!
//! ## Responsibilities
//!
//! - Single logical WebSocket connection to the central brain, with
//!   automatic reconnection
//! - Bounded detection history (newest first), seeded once from REST
//! - City-status polling on an independent fixed interval
//!
//! The streaming channel is an explicit state machine
//! (Disconnected -> Connecting -> Connected -> Disconnected) driven by a
//! single task. That task is the only reconnect scheduler, so at most one
//! reconnect timer is ever pending; `reconnect()` and `close()` are
//! commands on a channel rather than callbacks over shared closures.
//!
//! Poll and push feed distinct fields. A late poll response simply loses
//! to a newer one; the channels make no ordering assumptions about each
//! other.

use crate::api_client::ApiClient;
use crate::emergency::EmergencyMonitor;
use crate::models::{CityStatus, ConnectionState, DetectionEvent, SystemStateFrame};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Streaming channel phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Commands accepted by the connection task
#[derive(Debug)]
enum ConnCommand {
    /// Cancel any pending reconnect delay and reconnect now
    Reconnect,
    /// Stop the connection task for good
    Shutdown,
}

/// Why the inner read loop ended
enum Disconnect {
    Lost,
    Reconnect,
    Shutdown,
}

/// Shared stream state. Single writer: the connection task (plus the
/// one-shot history seed before it starts).
#[derive(Debug)]
pub struct StreamState {
    pub phase: ConnPhase,
    pub connection: ConnectionState,
    pub latest: Option<DetectionEvent>,
    pub latest_system: Option<SystemStateFrame>,
    /// Newest first; never longer than `capacity`
    pub history: VecDeque<DetectionEvent>,
    capacity: usize,
    reconnect_pending: bool,
}

impl StreamState {
    fn new(capacity: usize) -> Self {
        Self {
            phase: ConnPhase::Disconnected,
            connection: ConnectionState::default(),
            latest: None,
            latest_system: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
            reconnect_pending: false,
        }
    }

    fn mark_connecting(&mut self) {
        self.phase = ConnPhase::Connecting;
        self.connection.is_connected = false;
        self.reconnect_pending = false;
    }

    fn mark_connected(&mut self) {
        self.phase = ConnPhase::Connected;
        self.connection.is_connected = true;
        self.connection.last_error = None;
    }

    /// Transition to Disconnected. Returns whether a reconnect should be
    /// scheduled; a second close while one is already pending must not
    /// stack another timer.
    fn mark_disconnected(&mut self, error: Option<String>) -> bool {
        self.phase = ConnPhase::Disconnected;
        self.connection.is_connected = false;
        if let Some(error) = error {
            self.connection.last_error = Some(error);
        }
        if self.reconnect_pending {
            return false;
        }
        self.reconnect_pending = true;
        true
    }

    /// Apply one inbound text frame. Malformed frames are logged and
    /// dropped; they never alter state.
    fn handle_frame(&mut self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stream frame");
                return;
            }
        };

        // Handshake sentinel, not a data frame.
        if value.get("type").and_then(|t| t.as_str()) == Some("welcome") {
            return;
        }

        if let Ok(event) = serde_json::from_value::<DetectionEvent>(value.clone()) {
            self.history.push_front(event.clone());
            self.history.truncate(self.capacity);
            self.latest = Some(event);
            return;
        }

        match serde_json::from_value::<SystemStateFrame>(value) {
            Ok(frame) => self.latest_system = Some(frame),
            Err(e) => tracing::warn!(error = %e, "Dropping unrecognized stream frame"),
        }
    }
}

/// LiveConnectionManager instance
pub struct LiveConnectionManager {
    api: Arc<ApiClient>,
    emergency: Arc<EmergencyMonitor>,
    ws_url: String,
    reconnect_delay: Duration,
    poll_interval: Duration,
    history_limit: usize,
    stream: Arc<RwLock<StreamState>>,
    city_status: Arc<RwLock<Option<CityStatus>>>,
    cmd_tx: RwLock<Option<mpsc::UnboundedSender<ConnCommand>>>,
    ws_task: RwLock<Option<JoinHandle<()>>>,
    poll_task: RwLock<Option<JoinHandle<()>>>,
}

impl LiveConnectionManager {
    /// Create new LiveConnectionManager
    pub fn new(
        api: Arc<ApiClient>,
        emergency: Arc<EmergencyMonitor>,
        ws_url: String,
        reconnect_delay: Duration,
        poll_interval: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            api,
            emergency,
            ws_url,
            reconnect_delay,
            poll_interval,
            history_limit,
            stream: Arc::new(RwLock::new(StreamState::new(history_limit))),
            city_status: Arc::new(RwLock::new(None)),
            cmd_tx: RwLock::new(None),
            ws_task: RwLock::new(None),
            poll_task: RwLock::new(None),
        }
    }

    /// Seed history from REST, then start the streaming and polling tasks
    pub async fn start(&self) {
        {
            let guard = self.cmd_tx.read().await;
            if guard.is_some() {
                tracing::warn!("Live connection already running");
                return;
            }
        }

        match self.api.fetch_history(self.history_limit).await {
            Ok(events) => {
                let mut stream = self.stream.write().await;
                stream.history = events.into_iter().take(self.history_limit).collect();
                tracing::info!(seeded = stream.history.len(), "Detection history seeded");
            }
            Err(e) => tracing::warn!(error = %e, "History seed failed, starting empty"),
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        *self.cmd_tx.write().await = Some(cmd_tx);

        *self.ws_task.write().await = Some(tokio::spawn(Self::connection_loop(
            self.ws_url.clone(),
            self.reconnect_delay,
            self.stream.clone(),
            cmd_rx,
        )));
        *self.poll_task.write().await = Some(tokio::spawn(Self::poll_loop(
            self.api.clone(),
            self.emergency.clone(),
            self.poll_interval,
            self.city_status.clone(),
        )));

        tracing::info!(ws_url = %self.ws_url, "Live connection started");
    }

    /// Force an immediate reconnect, cancelling any pending delay and
    /// closing the current socket first if open
    pub async fn reconnect(&self) {
        if let Some(tx) = self.cmd_tx.read().await.as_ref() {
            let _ = tx.send(ConnCommand::Reconnect);
        }
    }

    /// Stop both channels. No tasks or timers outlive this call.
    pub async fn close(&self) {
        if let Some(tx) = self.cmd_tx.write().await.take() {
            let _ = tx.send(ConnCommand::Shutdown);
        }
        if let Some(task) = self.poll_task.write().await.take() {
            task.abort();
        }
        if let Some(task) = self.ws_task.write().await.take() {
            let _ = task.await;
        }
        tracing::info!("Live connection closed");
    }

    /// Latest detection event, if any arrived yet
    pub async fn latest(&self) -> Option<DetectionEvent> {
        self.stream.read().await.latest.clone()
    }

    /// Latest system-state frame (crossing-simulation deployments)
    pub async fn latest_system(&self) -> Option<SystemStateFrame> {
        self.stream.read().await.latest_system.clone()
    }

    /// Detection history snapshot, newest first
    pub async fn history(&self) -> Vec<DetectionEvent> {
        self.stream.read().await.history.iter().cloned().collect()
    }

    /// Streaming channel health
    pub async fn connection(&self) -> ConnectionState {
        self.stream.read().await.connection.clone()
    }

    /// Streaming channel phase
    pub async fn phase(&self) -> ConnPhase {
        self.stream.read().await.phase
    }

    /// Latest polled city status snapshot
    pub async fn city_status(&self) -> Option<CityStatus> {
        self.city_status.read().await.clone()
    }

    async fn connection_loop(
        ws_url: String,
        reconnect_delay: Duration,
        stream: Arc<RwLock<StreamState>>,
        mut cmd_rx: mpsc::UnboundedReceiver<ConnCommand>,
    ) {
        loop {
            stream.write().await.mark_connecting();
            tracing::debug!(url = %ws_url, "Connecting to detection stream");

            match connect_async(ws_url.as_str()).await {
                Ok((mut socket, _)) => {
                    stream.write().await.mark_connected();
                    tracing::info!("Detection stream connected");

                    let disconnect = loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => match cmd {
                                Some(ConnCommand::Reconnect) => {
                                    tracing::info!("Manual reconnect requested, closing stream");
                                    let _ = socket.close(None).await;
                                    break Disconnect::Reconnect;
                                }
                                Some(ConnCommand::Shutdown) | None => {
                                    let _ = socket.close(None).await;
                                    break Disconnect::Shutdown;
                                }
                            },
                            frame = socket.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    stream.write().await.handle_frame(&text);
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    tracing::warn!("Detection stream closed by server");
                                    break Disconnect::Lost;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::warn!(error = %e, "Detection stream error");
                                    stream.write().await.connection.last_error =
                                        Some(e.to_string());
                                    break Disconnect::Lost;
                                }
                            },
                        }
                    };

                    stream.write().await.mark_disconnected(None);

                    match disconnect {
                        Disconnect::Shutdown => break,
                        // Immediate reconnect, skipping the delay below.
                        Disconnect::Reconnect => continue,
                        Disconnect::Lost => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Detection stream connect failed");
                    stream.write().await.mark_disconnected(Some(e.to_string()));
                }
            }

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCommand::Reconnect) => {}
                    Some(ConnCommand::Shutdown) | None => break,
                },
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }

        stream.write().await.mark_disconnected(None);
        tracing::info!("Detection stream task stopped");
    }

    async fn poll_loop(
        api: Arc<ApiClient>,
        emergency: Arc<EmergencyMonitor>,
        poll_interval: Duration,
        city_status: Arc<RwLock<Option<CityStatus>>>,
    ) {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            interval.tick().await;

            match api.fetch_city_status().await {
                Ok(status) => {
                    emergency.observe(&status).await;
                    *city_status.write().await = Some(status);
                }
                Err(e) => {
                    // Previous snapshot stays; the streaming channel is
                    // unaffected.
                    tracing::warn!(error = %e, "City status poll failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;

    fn detection_json(object_id: i64) -> String {
        format!(
            r#"{{"type":"detection","object_class":"person","confidence":0.9,"in_roi":true,"object_id":{},"duration_seconds":1.0,"timestamp":"2026-08-01T10:00:00Z"}}"#,
            object_id
        )
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let mut state = StreamState::new(50);
        for i in 0..51 {
            state.handle_frame(&detection_json(i));
        }

        assert_eq!(state.history.len(), 50);
        // Newest at head, oldest (id 0) evicted.
        assert_eq!(state.history.front().unwrap().object_id, 50);
        assert!(state.history.iter().all(|e| e.object_id != 0));
        assert_eq!(state.latest.as_ref().unwrap().object_id, 50);
    }

    #[test]
    fn welcome_frame_is_discarded() {
        let mut state = StreamState::new(50);
        state.handle_frame(r#"{"type":"welcome","timestamp":"2026-08-01T10:00:00Z","message":"Connected to Aeon RailGuard WS"}"#);

        assert!(state.latest.is_none());
        assert!(state.history.is_empty());
    }

    #[test]
    fn malformed_frame_leaves_state_untouched() {
        let mut state = StreamState::new(50);
        state.handle_frame(&detection_json(1));

        state.handle_frame("{not json");
        state.handle_frame(r#"{"type":"detection","object_class":42}"#);

        assert_eq!(state.history.len(), 1);
        assert_eq!(state.latest.as_ref().unwrap().object_id, 1);
    }

    #[test]
    fn system_frame_kept_apart_from_detections() {
        let mut state = StreamState::new(50);
        state.handle_frame(
            r#"{"distance":4.2,"status":"WARNING","city_response":"TRAFFIC_SLOW","speed":72.0,"eta":210.0}"#,
        );

        assert!(state.history.is_empty());
        assert!(state.latest.is_none());
        assert_eq!(state.latest_system.as_ref().unwrap().status, "WARNING");
    }

    #[test]
    fn double_close_schedules_single_reconnect() {
        let mut state = StreamState::new(50);
        state.mark_connecting();
        state.mark_connected();

        assert!(state.mark_disconnected(None));
        assert!(!state.mark_disconnected(None));

        // Once the reconnect actually starts, a later close may schedule
        // again.
        state.mark_connecting();
        assert!(state.mark_disconnected(None));
    }

    #[test]
    fn connected_clears_last_error() {
        let mut state = StreamState::new(50);
        state.mark_disconnected(Some("connection refused".to_string()));
        assert_eq!(
            state.connection.last_error.as_deref(),
            Some("connection refused")
        );

        state.mark_connecting();
        state.mark_connected();
        assert!(state.connection.last_error.is_none());
        assert!(state.connection.is_connected);
    }

    #[tokio::test]
    async fn stream_reconnects_and_caps_history() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First session drops immediately to force a reconnect; the
            // second delivers the frames.
            for session in 0..2 {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

                if session == 0 {
                    let _ = ws.close(None).await;
                    continue;
                }

                ws.send(Message::Text(
                    r#"{"type":"welcome","message":"hello"}"#.to_string(),
                ))
                .await
                .unwrap();
                for i in 0..51 {
                    ws.send(Message::Text(detection_json(i))).await.unwrap();
                }
                while let Some(Ok(_)) = ws.next().await {}
            }
        });

        let api = Arc::new(ApiClient::new("http://localhost:0".to_string()));
        let emergency = Arc::new(EmergencyMonitor::new());
        let manager = LiveConnectionManager::new(
            api,
            emergency,
            format!("ws://{}", addr),
            Duration::from_millis(50),
            Duration::from_secs(60),
            50,
        );
        manager.start().await;

        let mut history = Vec::new();
        for _ in 0..200 {
            history = manager.history().await;
            if history.len() == 50 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(history.len(), 50);
        assert_eq!(history[0].object_id, 50);
        assert!(history.iter().all(|e| e.object_id != 0));
        assert!(manager.connection().await.is_connected);

        manager.close().await;
        assert_eq!(manager.phase().await, ConnPhase::Disconnected);

        server.abort();
    }
}
