//! RailGuard Operator Console Core
//!
//! Client-side live-state synchronization core for the rail-crossing
//! safety network console.
//!
//! ## Architecture (6 Components)
//!
//! 1. ApiClient - Central-brain REST adapter
//! 2. HierarchyStore - Role-scoped hierarchy, normalized to a Region
//! 3. LiveConnectionManager - Detection stream + city-status polling
//! 4. SelectionController - Focused entity, drill-down and map views
//! 5. EmergencyMonitor - Citywide alert flag
//! 6. MediaGateway - Range-capable recorded video serving
//!
//! ## Design Principles
//!
//! - Single writer: each component owns its own mutable state; every
//!   other component only reads or calls the owner's operations
//! - The tree is replaced wholesale on refresh, never patched in place
//! - Failures recover at the component boundary that produced them; the
//!   UI always sees last known good state plus a status indicator

pub mod api_client;
pub mod emergency;
pub mod error;
pub mod hierarchy_store;
pub mod live_connection;
pub mod media_gateway;
pub mod models;
pub mod selection;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
