//! ApiClient - Central-Brain REST Adapter
//!
//! ## Responsibilities
//!
//! - Typed access to the central-brain REST endpoints
//! - Response parsing
//! - Connection management
//!
//! The hierarchy endpoint returns a different shape per role, so it is
//! exposed as raw JSON here; normalization lives in the HierarchyStore.

use crate::error::{Error, Result};
use crate::models::{CityStatus, DetectionEvent, LoginRequest, LoginResponse, Role};
use serde::Deserialize;
use std::time::Duration;

/// Central-brain REST client
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

/// Envelope around the history snapshot
#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    history: Vec<DetectionEvent>,
}

impl ApiClient {
    /// Create new client with the default 10s timeout
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create new client with custom timeout
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Check central-brain health
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Fetch the role-scoped hierarchy. The body is a Region for `daop`,
    /// a bare Station for `station`, a bare Post for `jpl`.
    pub async fn fetch_hierarchy(&self, role: Role) -> Result<serde_json::Value> {
        let url = format!("{}/api/hierarchy?role={}", self.base_url, role.as_str());
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Api(format!(
                "hierarchy fetch failed: {}",
                resp.status()
            )));
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(json)
    }

    /// Fetch the current city status snapshot
    pub async fn fetch_city_status(&self) -> Result<CityStatus> {
        let url = format!("{}/api/city-status", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Api(format!(
                "city status fetch failed: {}",
                resp.status()
            )));
        }

        let status: CityStatus = resp.json().await?;
        Ok(status)
    }

    /// Fetch the most recent detection events, newest first
    pub async fn fetch_history(&self, limit: usize) -> Result<Vec<DetectionEvent>> {
        let url = format!("{}/api/history?limit={}", self.base_url, limit);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Api(format!(
                "history fetch failed: {}",
                resp.status()
            )));
        }

        let envelope: HistoryEnvelope = resp.json().await?;
        Ok(envelope.history)
    }

    /// Authenticate and obtain a token
    pub async fn login(&self, id: &str, password: &str) -> Result<LoginResponse> {
        let url = format!("{}/api/auth/login", self.base_url);
        let body = LoginRequest {
            id: id.to_string(),
            password: password.to_string(),
        };

        let resp = self.client.post(&url).json(&body).send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized("Invalid credentials".to_string()));
        }
        if !resp.status().is_success() {
            return Err(Error::Api(format!("login failed: {}", resp.status())));
        }

        let login: LoginResponse = resp.json().await?;
        Ok(login)
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
