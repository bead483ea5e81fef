//! SelectionController - Focused Entity Tracking
//!
//! ## Responsibilities
//!
//! - Track the single focused node shared by tree, map and telemetry
//! - Resolve selections by id against the current tree
//! - Derive drill-down views and map viewport requests
//!
//! After a tree reload an existing selection may point at an entity the
//! new tree no longer contains. The controller does not repair this on
//! its own; callers reselect (the HierarchyStore's default selection
//! covers the common path) or `clear()` explicitly.

use crate::models::{NodeEntity, NodeKind, Post, Region, SelectedNode, Station, Unit};
use tokio::sync::RwLock;

/// Fallback map center when a post has no unit coordinates
pub const FALLBACK_CENTER: (f64, f64) = (-7.55, 112.15);

const UNIT_ZOOM: u8 = 17;
const POST_ZOOM: u8 = 16;
const STATION_MAX_ZOOM: u8 = 14;
const REGION_MAX_ZOOM: u8 = 12;

/// Viewport request derived from a selection
#[derive(Debug, Clone, PartialEq)]
pub enum Viewport {
    /// Center on a single coordinate
    Center { lat: f64, long: f64, zoom: u8 },
    /// Fit a bounding box over a set of coordinates
    Bounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        max_zoom: u8,
    },
}

/// Child entities relevant to the current focus
#[derive(Debug, Clone, Default)]
pub struct FilteredView {
    pub posts: Vec<Post>,
    pub units: Vec<Unit>,
}

/// SelectionController instance
pub struct SelectionController {
    selected: RwLock<Option<SelectedNode>>,
}

impl SelectionController {
    /// Create new SelectionController
    pub fn new() -> Self {
        Self {
            selected: RwLock::new(None),
        }
    }

    /// Snapshot of the current selection
    pub async fn selected(&self) -> Option<SelectedNode> {
        self.selected.read().await.clone()
    }

    /// Install a selection directly (e.g. a store's default selection)
    pub async fn set(&self, node: Option<SelectedNode>) {
        *self.selected.write().await = node;
    }

    /// Drop the selection
    pub async fn clear(&self) {
        *self.selected.write().await = None;
    }

    /// Direct selection when the caller already holds the entity
    pub async fn select_region(&self, region: &Region) {
        self.set(Some(SelectedNode {
            id: region.id.clone(),
            display_name: region.name.clone(),
            kind: NodeKind::Region,
            entity: NodeEntity::Region(region.clone()),
        }))
        .await;
    }

    pub async fn select_station(&self, station: &Station) {
        self.set(Some(SelectedNode {
            id: station.id.clone(),
            display_name: station.name.clone(),
            kind: NodeKind::Station,
            entity: NodeEntity::Station(station.clone()),
        }))
        .await;
    }

    pub async fn select_post(&self, post: &Post) {
        self.set(Some(SelectedNode {
            id: post.id.clone(),
            display_name: post.name.clone(),
            kind: NodeKind::Post,
            entity: NodeEntity::Post(post.clone()),
        }))
        .await;
    }

    pub async fn select_unit(&self, unit: &Unit) {
        self.set(Some(SelectedNode {
            id: unit.id.clone(),
            display_name: unit.name.clone(),
            kind: NodeKind::Unit,
            entity: NodeEntity::Unit(unit.clone()),
        }))
        .await;
    }

    /// Selection by identity, depth-first over the current tree. An id
    /// that matches no node of the requested kind leaves the selection
    /// unchanged - a benign race between tree refresh and a stale
    /// selection request, not an error.
    pub async fn select_by_id(&self, tree: &Region, id: &str, kind: NodeKind) {
        match find_node(tree, id, kind) {
            Some(node) => *self.selected.write().await = Some(node),
            None => {
                tracing::debug!(id = %id, kind = ?kind, "Selection target not in tree, keeping current")
            }
        }
    }

    /// Drill-down schedule for list views: a station shows its posts, a
    /// post its units, the region every post across all stations.
    pub async fn derive_filtered_view(&self, tree: &Region) -> FilteredView {
        let selected = self.selected.read().await;
        let Some(node) = selected.as_ref() else {
            return FilteredView::default();
        };

        match &node.entity {
            NodeEntity::Station(station) => FilteredView {
                posts: station.posts.clone(),
                units: Vec::new(),
            },
            NodeEntity::Post(post) => FilteredView {
                posts: Vec::new(),
                units: post.units.clone(),
            },
            NodeEntity::Region(_) => FilteredView {
                posts: tree
                    .stations
                    .iter()
                    .flat_map(|s| s.posts.iter().cloned())
                    .collect(),
                units: Vec::new(),
            },
            NodeEntity::Unit(_) => FilteredView::default(),
        }
    }
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first search Region -> Stations -> Posts -> Units, first match
/// of matching kind and id wins.
pub fn find_node(tree: &Region, id: &str, kind: NodeKind) -> Option<SelectedNode> {
    if kind == NodeKind::Region && tree.id == id {
        return Some(SelectedNode {
            id: tree.id.clone(),
            display_name: tree.name.clone(),
            kind: NodeKind::Region,
            entity: NodeEntity::Region(tree.clone()),
        });
    }

    for station in &tree.stations {
        if kind == NodeKind::Station && station.id == id {
            return Some(SelectedNode {
                id: station.id.clone(),
                display_name: station.name.clone(),
                kind: NodeKind::Station,
                entity: NodeEntity::Station(station.clone()),
            });
        }
        for post in &station.posts {
            if kind == NodeKind::Post && post.id == id {
                return Some(SelectedNode {
                    id: post.id.clone(),
                    display_name: post.name.clone(),
                    kind: NodeKind::Post,
                    entity: NodeEntity::Post(post.clone()),
                });
            }
            for unit in &post.units {
                if kind == NodeKind::Unit && unit.id == id {
                    return Some(SelectedNode {
                        id: unit.id.clone(),
                        display_name: unit.name.clone(),
                        kind: NodeKind::Unit,
                        entity: NodeEntity::Unit(unit.clone()),
                    });
                }
            }
        }
    }

    None
}

/// Viewport transform for the map surface. Pure in (selection, tree);
/// empty coordinate sets yield `None` (viewport unchanged).
pub fn viewport_for(selection: &SelectedNode, tree: &Region) -> Option<Viewport> {
    match &selection.entity {
        NodeEntity::Unit(unit) => Some(Viewport::Center {
            lat: unit.lat,
            long: unit.long,
            zoom: UNIT_ZOOM,
        }),
        NodeEntity::Post(post) => {
            let (lat, long) = post
                .units
                .first()
                .map(|u| (u.lat, u.long))
                .unwrap_or(FALLBACK_CENTER);
            Some(Viewport::Center {
                lat,
                long,
                zoom: POST_ZOOM,
            })
        }
        NodeEntity::Station(station) => bounds_of(
            station.posts.iter().flat_map(|p| p.units.iter()),
            STATION_MAX_ZOOM,
        ),
        NodeEntity::Region(_) => bounds_of(
            tree.stations
                .iter()
                .flat_map(|s| s.posts.iter())
                .flat_map(|p| p.units.iter()),
            REGION_MAX_ZOOM,
        ),
    }
}

fn bounds_of<'a>(units: impl Iterator<Item = &'a Unit>, max_zoom: u8) -> Option<Viewport> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for unit in units {
        let b = bounds.get_or_insert((unit.lat, unit.long, unit.lat, unit.long));
        b.0 = b.0.min(unit.lat);
        b.1 = b.1.min(unit.long);
        b.2 = b.2.max(unit.lat);
        b.3 = b.3.max(unit.long);
    }
    bounds.map(|(south, west, north, east)| Viewport::Bounds {
        south,
        west,
        north,
        east,
        max_zoom,
    })
}
