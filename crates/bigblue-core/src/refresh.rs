// ── Polling cycle ──
//
// One cycle: make sure a session exists, discover devices once, then fetch
// every device concurrently and merge the results into a fleet snapshot.
// A device that yields no telemetry is recorded as unavailable and left
// out of `devices`; it never fails the cycle.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use bigblue_api::{DeviceDescriptor, Error as ApiError, RawRecord};

use crate::config::TransportMode;
use crate::convert::{self, DeviceFetch};
use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::{DataSource, DeviceSnapshot, FleetSnapshot, MacAddress, Unavailability};

impl Coordinator {
    /// Build a new fleet snapshot. Only session and discovery failures
    /// escape as errors.
    pub(crate) async fn run_cycle(&self) -> Result<FleetSnapshot, CoreError> {
        self.ensure_session()
            .await
            .map_err(|e| CoreError::UpdateFailed {
                message: format!("authentication failed: {e}"),
            })?;
        let devices = self.ensure_devices().await?;

        let results = join_all(devices.iter().map(|d| self.fetch_device(d))).await;

        let mut fleet = FleetSnapshot {
            refreshed_at: Some(Utc::now()),
            ..FleetSnapshot::default()
        };
        for (descriptor, result) in devices.iter().zip(results) {
            let mac = MacAddress::new(&descriptor.ble_mac);
            match result {
                Ok(snapshot) => {
                    fleet.devices.insert(mac, Arc::new(snapshot));
                }
                Err(reason) => {
                    fleet.unavailable.insert(mac, reason);
                }
            }
        }
        Ok(fleet)
    }

    /// Authenticate when the client holds no session.
    pub(crate) async fn ensure_session(&self) -> Result<(), ApiError> {
        let cloud = &self.inner.cloud;
        if cloud.has_session() {
            return Ok(());
        }
        cloud.authenticate().await.map(drop)
    }

    /// The cached device list, fetched on first use.
    async fn ensure_devices(&self) -> Result<Arc<Vec<DeviceDescriptor>>, CoreError> {
        let store = &self.inner.store;
        let cached = store.descriptors();
        if !cached.is_empty() {
            return Ok(cached);
        }

        let devices = self
            .inner
            .cloud
            .list_devices()
            .await
            .map_err(|e| CoreError::UpdateFailed {
                message: format!("device discovery failed: {e}"),
            })?;
        if devices.is_empty() {
            return Err(CoreError::NoDevices);
        }

        info!(count = devices.len(), "discovered devices");
        self.probe_local(&devices).await;
        store.set_descriptors(devices);
        Ok(store.descriptors())
    }

    /// Report which discovered devices answer on the local network.
    /// Informational only; every cycle still tries local first per device.
    async fn probe_local(&self, devices: &[DeviceDescriptor]) {
        let Some(local) = self.inner.local.as_ref() else {
            return;
        };
        if self.inner.config.transport == TransportMode::Cloud {
            return;
        }
        let probes = devices.iter().filter_map(|d| {
            let address = d.local_address()?;
            Some(async move { (d.ble_mac.as_str(), address, local.probe(address).await) })
        });
        for (mac, address, reachable) in join_all(probes).await {
            info!(mac, address, reachable, "local API probe");
        }
    }

    async fn fetch_device(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<DeviceSnapshot, Unavailability> {
        let mac = descriptor.ble_mac.as_str();
        let (raw, source) = self.fetch_telemetry(descriptor).await?;

        let cloud = &self.inner.cloud;
        let (settings, firmware, firmware_status, info) = tokio::join!(
            cloud.fetch_settings(mac),
            cloud.fetch_firmware_info(mac),
            cloud.fetch_firmware_status(mac),
            cloud.fetch_device_info(mac),
        );

        let fetch = DeviceFetch {
            raw,
            source,
            settings: unwrap_or_empty("settings", mac, settings),
            firmware: unwrap_or_empty("firmware info", mac, firmware),
            firmware_status: unwrap_or_empty("firmware status", mac, firmware_status),
            info: unwrap_or_empty("device info", mac, info),
        };
        Ok(convert::snapshot(descriptor, fetch, Utc::now()))
    }

    /// Read telemetry through the configured transport.
    async fn fetch_telemetry(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<(RawRecord, DataSource), Unavailability> {
        let mac = descriptor.ble_mac.as_str();
        let mode = self.inner.config.transport;

        if mode != TransportMode::Cloud {
            if let (Some(local), Some(address)) =
                (self.inner.local.as_ref(), descriptor.local_address())
            {
                if let Some(raw) = local.fetch_telemetry(address, mac).await {
                    debug!(mac, address, "telemetry from local API");
                    return Ok((raw, DataSource::Local));
                }
                if mode == TransportMode::Local {
                    warn!(mac, address, "local API produced no data");
                    return Err(Unavailability::Failed {
                        message: format!("no answer from local API at {address}"),
                    });
                }
                debug!(mac, address, "local API produced no data, trying cloud");
            }
        }

        match self.inner.cloud.fetch_telemetry(mac).await {
            Ok(raw) if !raw.is_empty() => Ok((raw, DataSource::Cloud)),
            Ok(_) => {
                warn!(mac, "cloud returned no telemetry");
                Err(Unavailability::NotFound)
            }
            Err(ApiError::DeviceOffline) => {
                warn!(mac, "device offline");
                Err(Unavailability::Offline)
            }
            Err(ApiError::DeviceNotFound) => {
                warn!(mac, "no telemetry record for device");
                Err(Unavailability::NotFound)
            }
            Err(e) => {
                warn!(mac, error = %e, "telemetry fetch failed");
                Err(Unavailability::Failed {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Best-effort result: failures become the empty value with one log line.
fn unwrap_or_empty<T: Default>(endpoint: &str, mac: &str, result: Result<T, ApiError>) -> T {
    match result {
        Ok(value) => value,
        Err(ref e) if e.is_benign() => {
            debug!(mac, "{endpoint}: not available ({e}), treating as empty");
            T::default()
        }
        Err(e) => {
            warn!(mac, "{endpoint}: unexpected error {e}, treating as empty");
            T::default()
        }
    }
}
