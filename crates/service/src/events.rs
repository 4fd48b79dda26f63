//! "Maintenance state changed" notifications.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Name external observers subscribe to.
pub const MAINTENANCE_MODE_CHANGED: &str = "maintenance_mode_changed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum MaintenanceEvent {
    #[serde(rename = "maintenance_mode_changed")]
    StateChanged { is_on: bool },
}

impl MaintenanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceEvent::StateChanged { .. } => MAINTENANCE_MODE_CHANGED,
        }
    }
}

/// Broadcast bus shared by the gate and the local fallback.
#[derive(Clone)]
pub struct MaintenanceEvents {
    tx: broadcast::Sender<MaintenanceEvent>,
}

impl Default for MaintenanceEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MaintenanceEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MaintenanceEvent> {
        self.tx.subscribe()
    }

    /// Emit `maintenance_mode_changed`; returns how many subscribers received it.
    pub fn state_changed(&self, is_on: bool) -> usize {
        let event = MaintenanceEvent::StateChanged { is_on };
        let name = event.name();
        // ignore error if no subscribers
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(event = name, is_on, delivered, "maintenance event emitted");
        delivered
    }
}
