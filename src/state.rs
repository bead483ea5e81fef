//! Application state
//!
//! Holds configuration and all shared components

use crate::api_client::ApiClient;
use crate::emergency::EmergencyMonitor;
use crate::hierarchy_store::HierarchyStore;
use crate::live_connection::LiveConnectionManager;
use crate::models::Role;
use crate::selection::SelectionController;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Central-brain REST base URL
    pub api_base_url: String,
    /// Detection stream WebSocket URL
    pub ws_url: String,
    /// Console HTTP host
    pub host: String,
    /// Console HTTP port
    pub port: u16,
    /// Root directory for recorded video clips
    pub media_dir: PathBuf,
    /// Role the console starts in
    pub initial_role: Role,
    /// Detection history capacity
    pub history_limit: usize,
    /// City-status poll interval
    pub status_poll_interval: Duration,
    /// Delay before an automatic stream reconnect
    pub reconnect_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            ws_url: std::env::var("WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8080/ws".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
            media_dir: std::env::var("MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/railguard/videos")),
            initial_role: std::env::var("CONSOLE_ROLE")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(Role::Station),
            history_limit: 50,
            status_poll_interval: Duration::from_secs(2),
            reconnect_delay: Duration::from_millis(2500),
        }
    }
}

/// Application state shared across handlers and surfaces
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Central-brain REST adapter
    pub api: Arc<ApiClient>,
    /// Role-scoped hierarchy tree
    pub hierarchy: Arc<HierarchyStore>,
    /// Focused entity
    pub selection: Arc<SelectionController>,
    /// Streaming + status channels
    pub live: Arc<LiveConnectionManager>,
    /// Citywide alert flag
    pub emergency: Arc<EmergencyMonitor>,
}
