//! EmergencyMonitor - Citywide Alert Flag
//!
//! Reduces the polled city status and the operator's manual override to
//! the single boolean every surface gates alert styling on. The polled
//! component is recomputed from each snapshot, so a manual clear does
//! not suppress a later poll from re-raising the flag.

use crate::models::CityStatus;
use tokio::sync::RwLock;

/// Siren value that raises the emergency flag
pub const SIREN_CRITICAL: &str = "CRITICAL";
/// Traffic-light value meaning citywide lockdown
pub const TRAFFIC_RED_LOCK: &str = "RED_LOCK";

#[derive(Debug, Clone, Copy, Default)]
struct EmergencyFlags {
    manual: bool,
    polled: bool,
}

/// EmergencyMonitor instance
pub struct EmergencyMonitor {
    flags: RwLock<EmergencyFlags>,
}

impl EmergencyMonitor {
    /// Create new EmergencyMonitor
    pub fn new() -> Self {
        Self {
            flags: RwLock::new(EmergencyFlags::default()),
        }
    }

    /// Recompute the polled component from a fresh city status snapshot
    pub async fn observe(&self, status: &CityStatus) {
        let polled =
            status.siren == SIREN_CRITICAL || status.traffic_light == TRAFFIC_RED_LOCK;

        let mut flags = self.flags.write().await;
        if polled != flags.polled {
            tracing::info!(
                siren = %status.siren,
                traffic_light = %status.traffic_light,
                polled = polled,
                "Emergency condition changed by city status"
            );
        }
        flags.polled = polled;
    }

    /// Raise the manual override. Idempotent.
    pub async fn trigger(&self) {
        let mut flags = self.flags.write().await;
        if !flags.manual {
            tracing::warn!("Emergency triggered manually");
        }
        flags.manual = true;
    }

    /// Drop the manual override. Idempotent; the polled component is
    /// untouched.
    pub async fn clear(&self) {
        let mut flags = self.flags.write().await;
        if flags.manual {
            tracing::info!("Manual emergency cleared");
        }
        flags.manual = false;
    }

    /// The single alert boolean consumed by every surface
    pub async fn is_emergency(&self) -> bool {
        let flags = self.flags.read().await;
        flags.manual || flags.polled
    }
}

impl Default for EmergencyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(siren: &str, traffic_light: &str) -> CityStatus {
        CityStatus {
            traffic_light: traffic_light.to_string(),
            ambulance: "STANDBY".to_string(),
            police: "STANDBY".to_string(),
            evacuation_route: "CLEAR".to_string(),
            siren: siren.to_string(),
            rail_crossing: "OPEN".to_string(),
            last_update: "2026-08-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn critical_siren_raises_flag() {
        let monitor = EmergencyMonitor::new();
        monitor.observe(&status("CRITICAL", "GREEN_WAVE")).await;
        assert!(monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn red_lock_raises_flag() {
        let monitor = EmergencyMonitor::new();
        monitor.observe(&status("NOMINAL", "RED_LOCK")).await;
        assert!(monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn nominal_status_without_manual_is_clear() {
        let monitor = EmergencyMonitor::new();
        monitor.observe(&status("NOMINAL", "GREEN_WAVE")).await;
        assert!(!monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn nominal_poll_clears_prior_polled_condition() {
        let monitor = EmergencyMonitor::new();
        monitor.observe(&status("CRITICAL", "GREEN_WAVE")).await;
        assert!(monitor.is_emergency().await);

        monitor.observe(&status("NOMINAL", "GREEN_WAVE")).await;
        assert!(!monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn manual_trigger_holds_until_cleared() {
        let monitor = EmergencyMonitor::new();
        monitor.observe(&status("NOMINAL", "GREEN_WAVE")).await;

        monitor.trigger().await;
        assert!(monitor.is_emergency().await);

        // A nominal poll does not override the manual trigger.
        monitor.observe(&status("NOMINAL", "GREEN_WAVE")).await;
        assert!(monitor.is_emergency().await);

        monitor.clear().await;
        assert!(!monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn manual_clear_does_not_suppress_polled_condition() {
        let monitor = EmergencyMonitor::new();
        monitor.trigger().await;
        monitor.clear().await;

        monitor.observe(&status("CRITICAL", "GREEN_WAVE")).await;
        assert!(monitor.is_emergency().await);
    }

    #[tokio::test]
    async fn trigger_and_clear_are_idempotent() {
        let monitor = EmergencyMonitor::new();
        monitor.trigger().await;
        monitor.trigger().await;
        assert!(monitor.is_emergency().await);

        monitor.clear().await;
        monitor.clear().await;
        assert!(!monitor.is_emergency().await);
    }
}
