// ── Snapshot store ──
//
// Holds the last published fleet snapshot and the discovered device list.
// Publication is a single `ArcSwap` store, so a reader gets either the
// previous cycle or the new one in full. Cycle outcomes are broadcast on a
// `watch` channel.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use bigblue_api::DeviceDescriptor;

use crate::model::{DeviceSnapshot, FleetSnapshot, MacAddress};

/// Outcome of the most recent cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Completion time of the last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the last failed cycle, cleared by the next success.
    pub last_error: Option<String>,
    pub cycles: u64,
    pub failures: u64,
}

impl UpdateStatus {
    /// `true` when the most recent cycle succeeded.
    pub fn is_healthy(&self) -> bool {
        self.last_success.is_some() && self.last_error.is_none()
    }
}

/// Lock-free store for the coordinator's published state.
pub struct DataStore {
    fleet: ArcSwap<FleetSnapshot>,
    descriptors: ArcSwap<Vec<DeviceDescriptor>>,
    status: watch::Sender<UpdateStatus>,
}

impl DataStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(UpdateStatus::default());
        Self {
            fleet: ArcSwap::from_pointee(FleetSnapshot::default()),
            descriptors: ArcSwap::from_pointee(Vec::new()),
            status,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    /// The last published fleet snapshot.
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.fleet.load_full()
    }

    pub fn device(&self, mac: &MacAddress) -> Option<Arc<DeviceSnapshot>> {
        self.fleet.load().device(mac).cloned()
    }

    /// Devices discovered for the account, in discovery order.
    pub fn descriptors(&self) -> Arc<Vec<DeviceDescriptor>> {
        self.descriptors.load_full()
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UpdateStatus> {
        self.status.subscribe()
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub(crate) fn set_descriptors(&self, descriptors: Vec<DeviceDescriptor>) {
        self.descriptors.store(Arc::new(descriptors));
    }

    /// Swap in a new fleet snapshot and record the successful cycle.
    pub(crate) fn publish(&self, fleet: FleetSnapshot) {
        let refreshed_at = fleet.refreshed_at.unwrap_or_else(Utc::now);
        self.fleet.store(Arc::new(fleet));
        self.status.send_modify(|s| {
            s.last_success = Some(refreshed_at);
            s.last_error = None;
            s.cycles += 1;
        });
    }

    /// Record a failed cycle. The published snapshot is left untouched.
    pub(crate) fn record_failure(&self, message: String) {
        self.status.send_modify(|s| {
            s.last_error = Some(message);
            s.cycles += 1;
            s.failures += 1;
        });
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
