// ── Coordinator ──
//
// Lifecycle management for one Powafree account: first refresh, the
// periodic refresh task, on-demand refresh requests, and the command
// processor that serializes settings writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use bigblue_api::transport::DEFAULT_BASE_URL;
use bigblue_api::{
    CloudClient, DeviceDescriptor, Error as ApiError, LocalClient, SettingsBlob, TransportConfig,
};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::{CoordinatorConfig, LocalCapability};
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, FleetSnapshot, MacAddress};
use crate::store::{DataStore, UpdateStatus};

const COMMAND_CHANNEL_SIZE: usize = 16;

// ── CoordinatorState ─────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CoordinatorState {
    /// Built, not started.
    Idle,
    Running,
    /// Stopped; a stopped coordinator cannot be restarted.
    Stopped,
}

// ── Coordinator ──────────────────────────────────────────────────

/// The per-account context handed to every consumer.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Readers go through the
/// [`DataStore`] and never wait on a running cycle.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<CoordinatorInner>,
}

pub(crate) struct CoordinatorInner {
    pub(crate) config: CoordinatorConfig,
    pub(crate) cloud: CloudClient,
    /// Present only when the local capability is available.
    pub(crate) local: Option<LocalClient>,
    pub(crate) store: Arc<DataStore>,
    /// At most one cycle in flight.
    cycle_lock: Mutex<()>,
    refresh_requested: Notify,
    state: watch::Sender<CoordinatorState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build a coordinator and its HTTP clients. Does not touch the
    /// network; call [`start()`](Self::start) for that.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let base_url = match config.base_url.clone() {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL).map_err(ApiError::from)?,
        };
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let cloud = CloudClient::new(
            base_url,
            config.email.clone(),
            config.password.clone(),
            &transport,
        )?;
        let local = match config.local_capability() {
            LocalCapability::Available => Some(LocalClient::new(&transport)?),
            LocalCapability::Unavailable => None,
        };
        Ok(Self::with_clients(config, cloud, local))
    }

    /// Build a coordinator around pre-built clients.
    pub fn with_clients(
        config: CoordinatorConfig,
        cloud: CloudClient,
        local: Option<LocalClient>,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                cloud,
                local,
                store: Arc::new(DataStore::new()),
                cycle_lock: Mutex::new(()),
                refresh_requested: Notify::new(),
                state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Whether the local fast path was enabled at construction.
    pub fn local_capability(&self) -> LocalCapability {
        if self.inner.local.is_some() {
            LocalCapability::Available
        } else {
            LocalCapability::Unavailable
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first refresh, then spawn the refresh task and the
    /// command processor.
    ///
    /// A failure of this first refresh aborts startup; later cycle
    /// failures are only recorded in [`UpdateStatus`].
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.state() != CoordinatorState::Idle {
            return Err(CoreError::CoordinatorStopped);
        }

        self.refresh().await?;

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let coordinator = self.clone();
            handles.push(tokio::spawn(command_processor_task(coordinator, rx)));
        }

        let coordinator = self.clone();
        let period = self.inner.config.update_interval;
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(refresh_task(coordinator, period, cancel)));

        self.inner.state.send_replace(CoordinatorState::Running);
        info!(
            email = %self.inner.config.email,
            interval = ?period,
            transport = %self.inner.config.transport,
            "coordinator started"
        );
        Ok(())
    }

    /// Cancel the background tasks and wait for them to finish.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.state.send_replace(CoordinatorState::Stopped);
        debug!("coordinator stopped");
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one cycle now and publish its snapshot.
    ///
    /// On failure the previous snapshot stays published and the error is
    /// recorded in [`UpdateStatus`].
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _cycle = self.inner.cycle_lock.lock().await;

        match self.run_cycle().await {
            Ok(fleet) => {
                info!(
                    devices = fleet.len(),
                    unavailable = fleet.unavailable.len(),
                    "refresh complete"
                );
                self.inner.store.publish(fleet);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.inner.store.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    /// Ask the refresh task for a cycle. Requests made before the task
    /// wakes collapse into one cycle.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a settings write through the command processor.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.state() != CoordinatorState::Running {
            return Err(CoreError::CoordinatorStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;

        rx.await.map_err(|_| CoreError::CoordinatorStopped)?
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// Start, run `f`, stop. Periodic polling is disabled since a single
    /// invocation needs one cycle.
    pub async fn oneshot<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.update_interval = Duration::ZERO;

        let coordinator = Coordinator::new(cfg)?;
        if let Err(e) = coordinator.start().await {
            coordinator.stop().await;
            return Err(e);
        }
        let result = f(coordinator.clone()).await;
        coordinator.stop().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.inner.store.snapshot()
    }

    /// Latest snapshot of one device; `None` when it produced no data in
    /// the last successful cycle.
    pub fn device(&self, mac: &MacAddress) -> Option<Arc<DeviceSnapshot>> {
        self.inner.store.device(mac)
    }

    /// Every discovered device, including those without data.
    pub fn devices(&self) -> Arc<Vec<DeviceDescriptor>> {
        self.inner.store.descriptors()
    }

    pub fn update_status(&self) -> UpdateStatus {
        self.inner.store.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UpdateStatus> {
        self.inner.store.subscribe_status()
    }

    // ── Ad-hoc reads ─────────────────────────────────────────────

    /// Download the current settings blob of a discovered device.
    pub async fn fetch_settings(&self, mac: &MacAddress) -> Result<SettingsBlob, CoreError> {
        let descriptor = self.descriptor(mac)?;
        self.ensure_session().await?;
        Ok(self.inner.cloud.fetch_settings(&descriptor.ble_mac).await?)
    }

    /// The discovered descriptor matching `mac`, ignoring case and
    /// separators.
    pub(crate) fn descriptor(&self, mac: &MacAddress) -> Result<DeviceDescriptor, CoreError> {
        self.inner
            .store
            .descriptors()
            .iter()
            .find(|d| mac.matches(&d.ble_mac))
            .cloned()
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: mac.to_string(),
            })
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Run a cycle on every interval tick and on every refresh request.
/// A zero period leaves only the requests.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = (!period.is_zero()).then(|| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    if let Some(interval) = interval.as_mut() {
        interval.tick().await; // consume the immediate first tick
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = coordinator.inner.refresh_requested.notified() => {
                debug!("refresh requested");
            }
            () = next_tick(interval.as_mut()) => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            // Failures are already logged and recorded by `refresh()`.
            _ = coordinator.refresh() => {}
        }
    }
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(coordinator: Coordinator, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = coordinator.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&coordinator, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

/// Download the blob, overlay the command, upload the full blob when it
/// changed, then ask for a refresh.
async fn route_command(
    coordinator: &Coordinator,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    cmd.validate()?;
    let descriptor = coordinator.descriptor(cmd.mac())?;
    let mac = descriptor.ble_mac.as_str();
    coordinator.ensure_session().await?;

    let cloud = &coordinator.inner.cloud;
    let mut blob = cloud.fetch_settings(mac).await?;
    if blob.is_empty() {
        warn!(mac, "current settings unavailable, refusing to upload");
        return Err(ApiError::SettingsUnavailable { mac: mac.to_owned() }.into());
    }
    let (field, _) = cmd.overlay();

    if !cmd.apply(&mut blob) {
        info!(mac, field, "setting already current, nothing to upload");
        return Ok(CommandResult::Unchanged);
    }

    cloud
        .upload_settings(mac, &blob)
        .await
        .map_err(|e| match e {
            ApiError::Api { .. } | ApiError::Http { .. } => CoreError::Rejected {
                message: e.to_string(),
            },
            other => other.into(),
        })?;

    info!(mac, field, "settings uploaded");
    coordinator.request_refresh();
    Ok(CommandResult::Applied)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAC: &str = "AA:BB:CC:DD:EE:01";

    fn envelope(code: i64, data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "code": code, "data": data }))
    }

    async fn mount(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn failed_authentication_keeps_previous_snapshot() {
        let server = MockServer::start().await;
        mount(&server, "/api/user/login/email", envelope(0, json!({ "token": "t", "userId": 1 }))).await;
        mount(&server, "/api/devices/list", envelope(0, json!([{ "bleMac": MAC }]))).await;
        mount(&server, "/api/devices/last_data", envelope(0, json!({ "totalSoc": 900 }))).await;
        mount(&server, "/api/devices/setting/download", envelope(0, json!({ "mode": 1 }))).await;

        let mut config = CoordinatorConfig::new("a@b.c", "pw".to_string().into());
        config.base_url = Some(Url::parse(&server.uri()).unwrap());
        config.update_interval = Duration::ZERO;
        let coordinator = Coordinator::new(config).unwrap();
        coordinator.start().await.unwrap();
        let before = coordinator.snapshot();

        server.reset().await;
        mount(&server, "/api/user/login/email", envelope(1001, serde_json::Value::Null)).await;
        coordinator.inner.cloud.clear_session();

        let result = coordinator.refresh().await;
        assert!(matches!(result, Err(CoreError::UpdateFailed { .. })));

        let after = coordinator.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.device(&MacAddress::new(MAC)).is_some());

        let status = coordinator.update_status();
        assert!(status.last_success.is_some());
        assert!(status.last_error.is_some());
        assert!(!status.is_healthy());

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_is_terminal() {
        let config = CoordinatorConfig::new("a@b.c", "pw".to_string().into());
        let coordinator = Coordinator::new(config).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert_eq!(coordinator.local_capability(), LocalCapability::Unavailable);

        coordinator.stop().await;
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert!(matches!(coordinator.start().await, Err(CoreError::CoordinatorStopped)));
    }
}
