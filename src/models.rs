//! Shared models and types for the operator console
//!
//! Wire shapes mirror the central-brain JSON exactly. The hierarchy tree
//! is replaced wholesale on refresh and never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator role, used to scope the hierarchy fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Post operator (level crossing attendant)
    Jpl,
    /// Station operator
    Station,
    /// Regional administrator
    Daop,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Jpl => "jpl",
            Role::Station => "station",
            Role::Daop => "daop",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpl" => Ok(Role::Jpl),
            "station" => Ok(Role::Station),
            "daop" => Ok(Role::Daop),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Operational status of a camera unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitStatus {
    Online,
    Warning,
    Offline,
}

/// A single camera/sensor device at a crossing post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: UnitStatus,
    pub lat: f64,
    pub long: f64,
}

/// A level crossing (JPL) monitored by one or more units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub name: String,
    pub geo_location: String,
    pub units: Vec<Unit>,
}

/// A railway station responsible for a set of posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub head_officer: String,
    pub posts: Vec<Post>,
}

/// Top-level administrative region (DAOP). Root of the tree; exactly one
/// instance exists client-side at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub code: String,
    pub stations: Vec<Station>,
}

/// Discriminant for tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Region,
    Station,
    Post,
    Unit,
}

/// Entity payload carried by a selection
#[derive(Debug, Clone)]
pub enum NodeEntity {
    Region(Region),
    Station(Station),
    Post(Post),
    Unit(Unit),
}

/// The single focused node shared by every UI surface. Mutated only by
/// the SelectionController.
#[derive(Debug, Clone)]
pub struct SelectedNode {
    pub id: String,
    pub display_name: String,
    pub kind: NodeKind,
    pub entity: NodeEntity,
}

/// One reported sensor observation, as pushed by the detection stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub object_class: String,
    pub confidence: f64,
    pub in_roi: bool,
    pub object_id: i64,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// System-state frame pushed by crossing-simulation deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStateFrame {
    pub distance: f64,
    pub status: String,
    pub city_response: String,
    pub speed: f64,
    pub eta: f64,
}

/// Snapshot of citywide response-system state. Replaced wholesale on each
/// poll; no partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityStatus {
    pub traffic_light: String,
    pub ambulance: String,
    pub police: String,
    pub evacuation_route: String,
    pub siren: String,
    pub rail_crossing: String,
    pub last_update: String,
}

/// Streaming channel health, surfaced to the UI
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub last_error: Option<String>,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

/// Successful auth response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub user: UserInfo,
}

/// Public user info returned by login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub role: Role,
    pub name: String,
}
