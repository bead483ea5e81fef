//! HierarchyStore - Role-Scoped Hierarchy Owner
//!
//! ## Responsibilities
//!
//! - Fetch the hierarchy for the active role
//! - Normalize every role's response to a Region shape
//! - Compute the default selection after a successful load
//!
//! The backend returns a full Region for `daop`, a bare Station for
//! `station` and a bare Post for `jpl`. All downstream consumers assume
//! Region-shaped data, so the bare shapes are wrapped in a synthetic
//! region here. A failed load leaves the previous tree untouched; there
//! is no automatic retry - retries are user- or role-switch-triggered.

use crate::api_client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{NodeEntity, NodeKind, Post, Region, Role, SelectedNode, Station};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of normalizing one hierarchy response
#[derive(Debug, Clone)]
pub struct Normalized {
    pub region: Region,
    /// Guarantees the UI never shows "nothing selected" after a load:
    /// first station for `daop`, the wrapped entity for `station`/`jpl`.
    pub default_selection: Option<SelectedNode>,
}

/// HierarchyStore instance
pub struct HierarchyStore {
    api: Arc<ApiClient>,
    tree: RwLock<Option<Region>>,
    last_error: RwLock<Option<String>>,
    /// Monotonic load counter; only the most recently requested load may
    /// install its result.
    load_seq: AtomicU64,
}

impl HierarchyStore {
    /// Create new HierarchyStore
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            tree: RwLock::new(None),
            last_error: RwLock::new(None),
            load_seq: AtomicU64::new(0),
        }
    }

    /// Load the hierarchy for `role`, replacing the tree wholesale.
    ///
    /// Returns the default selection for the new tree, or `None` when a
    /// newer load superseded this one while the fetch was in flight (the
    /// stale result is discarded and the previous tree kept).
    pub async fn load_for_role(&self, role: Role) -> Result<Option<SelectedNode>> {
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let raw = match self.api.fetch_hierarchy(role).await {
            Ok(raw) => raw,
            Err(e) => {
                if self.load_seq.load(Ordering::SeqCst) == seq {
                    *self.last_error.write().await = Some(e.to_string());
                }
                tracing::error!(role = %role.as_str(), error = %e, "Hierarchy fetch failed");
                return Err(e);
            }
        };

        let normalized = match normalize(role, raw) {
            Ok(n) => n,
            Err(e) => {
                if self.load_seq.load(Ordering::SeqCst) == seq {
                    *self.last_error.write().await = Some(e.to_string());
                }
                tracing::error!(role = %role.as_str(), error = %e, "Hierarchy response malformed");
                return Err(e);
            }
        };

        if !self.commit(seq, &normalized).await {
            tracing::debug!(role = %role.as_str(), "Discarding stale hierarchy response");
            return Ok(None);
        }

        *self.last_error.write().await = None;
        tracing::info!(
            role = %role.as_str(),
            stations = normalized.region.stations.len(),
            "Hierarchy loaded"
        );

        Ok(normalized.default_selection)
    }

    /// Install a normalized tree if `seq` still belongs to the most
    /// recently requested load.
    async fn commit(&self, seq: u64, normalized: &Normalized) -> bool {
        let mut tree = self.tree.write().await;
        if self.load_seq.load(Ordering::SeqCst) != seq {
            return false;
        }
        *tree = Some(normalized.region.clone());
        true
    }

    /// Snapshot of the current tree
    pub async fn tree(&self) -> Option<Region> {
        self.tree.read().await.clone()
    }

    /// Error string from the last failed load, if any
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }
}

fn station_node(station: &Station) -> SelectedNode {
    SelectedNode {
        id: station.id.clone(),
        display_name: station.name.clone(),
        kind: NodeKind::Station,
        entity: NodeEntity::Station(station.clone()),
    }
}

fn post_node(post: &Post) -> SelectedNode {
    SelectedNode {
        id: post.id.clone(),
        display_name: post.name.clone(),
        kind: NodeKind::Post,
        entity: NodeEntity::Post(post.clone()),
    }
}

fn synthetic_region(stations: Vec<Station>) -> Region {
    Region {
        id: "virtual-region".to_string(),
        name: "My Region".to_string(),
        code: "VR".to_string(),
        stations,
    }
}

/// Normalize one hierarchy response into a Region plus default selection.
/// Pure in (role, body); unit-testable without a backend.
pub fn normalize(role: Role, raw: serde_json::Value) -> Result<Normalized> {
    match role {
        Role::Daop => {
            let region: Region = serde_json::from_value(raw)
                .map_err(|e| Error::Parse(format!("daop hierarchy: {}", e)))?;
            let default_selection = region.stations.first().map(station_node);
            Ok(Normalized {
                region,
                default_selection,
            })
        }
        Role::Station => {
            let station: Station = serde_json::from_value(raw)
                .map_err(|e| Error::Parse(format!("station hierarchy: {}", e)))?;
            let default_selection = Some(station_node(&station));
            Ok(Normalized {
                region: synthetic_region(vec![station]),
                default_selection,
            })
        }
        Role::Jpl => {
            let post: Post = serde_json::from_value(raw)
                .map_err(|e| Error::Parse(format!("jpl hierarchy: {}", e)))?;
            let default_selection = Some(post_node(&post));
            let station = Station {
                id: "virtual-station".to_string(),
                name: "My Station".to_string(),
                head_officer: String::new(),
                posts: vec![post],
            };
            Ok(Normalized {
                region: synthetic_region(vec![station]),
                default_selection,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daop_body() -> serde_json::Value {
        json!({
            "id": "DAOP-7",
            "name": "DAOP 7 MADIUN",
            "code": "D7",
            "stations": [
                {
                    "id": "STA-JBG",
                    "name": "Stasiun Jombang",
                    "head_officer": "Bpk. Sutrisno",
                    "posts": [
                        {
                            "id": "JPL-102",
                            "name": "Pos JPL 102 (Jombang Kota)",
                            "geo_location": "-7.5456, 112.2134",
                            "units": []
                        }
                    ]
                },
                {
                    "id": "STA-KTS",
                    "name": "Stasiun Kertosono",
                    "head_officer": "Bpk. Hartono",
                    "posts": []
                }
            ]
        })
    }

    #[test]
    fn daop_response_used_as_is() {
        let normalized = normalize(Role::Daop, daop_body()).unwrap();
        assert_eq!(normalized.region.id, "DAOP-7");
        assert_eq!(normalized.region.stations.len(), 2);

        let selection = normalized.default_selection.unwrap();
        assert_eq!(selection.kind, NodeKind::Station);
        assert_eq!(selection.id, "STA-JBG");
    }

    #[test]
    fn daop_without_stations_has_no_default_selection() {
        let body = json!({"id": "DAOP-8", "name": "DAOP 8", "code": "D8", "stations": []});
        let normalized = normalize(Role::Daop, body).unwrap();
        assert!(normalized.default_selection.is_none());
        assert!(normalized.region.stations.is_empty());
    }

    #[test]
    fn station_response_wrapped_in_synthetic_region() {
        let body = json!({
            "id": "STA-JBG",
            "name": "Stasiun Jombang",
            "head_officer": "Bpk. Sutrisno",
            "posts": []
        });
        let normalized = normalize(Role::Station, body).unwrap();

        assert_eq!(normalized.region.id, "virtual-region");
        assert_eq!(normalized.region.code, "VR");
        assert_eq!(normalized.region.stations.len(), 1);
        assert_eq!(normalized.region.stations[0].id, "STA-JBG");

        let selection = normalized.default_selection.unwrap();
        assert_eq!(selection.kind, NodeKind::Station);
        assert_eq!(selection.id, "STA-JBG");
    }

    #[test]
    fn jpl_response_wrapped_in_synthetic_station_and_region() {
        let body = json!({"id": "P1", "name": "Post A", "geo_location": "", "units": []});
        let normalized = normalize(Role::Jpl, body).unwrap();

        assert_eq!(normalized.region.id, "virtual-region");
        assert_eq!(normalized.region.stations.len(), 1);
        assert_eq!(normalized.region.stations[0].id, "virtual-station");
        assert_eq!(normalized.region.stations[0].posts.len(), 1);
        assert_eq!(normalized.region.stations[0].posts[0].id, "P1");

        let selection = normalized.default_selection.unwrap();
        assert_eq!(selection.kind, NodeKind::Post);
        assert_eq!(selection.id, "P1");
        assert_eq!(selection.display_name, "Post A");
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let body = json!({"id": "P1", "name": "Post A"});
        assert!(matches!(
            normalize(Role::Jpl, body),
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn stale_load_result_is_discarded() {
        let api = Arc::new(ApiClient::new("http://localhost:0".to_string()));
        let store = HierarchyStore::new(api);

        // A load starts, then a newer one is requested before the first
        // response arrives.
        let seq = store.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        store.load_seq.fetch_add(1, Ordering::SeqCst);

        let normalized = normalize(Role::Daop, daop_body()).unwrap();
        assert!(!store.commit(seq, &normalized).await);
        assert!(store.tree().await.is_none());

        // The newer load installs its own result.
        let normalized = normalize(Role::Daop, daop_body()).unwrap();
        assert!(store.commit(seq + 1, &normalized).await);
        assert_eq!(store.tree().await.unwrap().id, "DAOP-7");
    }
}
