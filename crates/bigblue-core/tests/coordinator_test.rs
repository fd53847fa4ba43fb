#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Full-cycle and command tests for `Coordinator` against a wiremock cloud.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use bigblue_core::{
    Command, CommandResult, Coordinator, CoordinatorConfig, CoordinatorState, CoreError,
    DataSource, FieldValue, MacAddress, Mode, TransportMode, Unavailability,
};

const MAC_A: &str = "AA:BB:CC:DD:EE:01";
const MAC_B: &str = "AA:BB:CC:DD:EE:02";

// ── Helpers ─────────────────────────────────────────────────────────

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "message": "success", "data": data }))
}

fn code(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": code, "message": message, "data": null }))
}

fn config(server: &MockServer) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new("owner@example.com", "hunter2".to_string().into());
    config.base_url = Some(Url::parse(&server.uri()).unwrap());
    config.update_interval = Duration::ZERO;
    config.transport = TransportMode::Cloud;
    config
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/user/login/email"))
        .respond_with(ok(json!({ "token": "tok-1", "userId": 77, "name": "Owner" })))
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer, devices: Value) {
    Mock::given(method("POST"))
        .and(path("/api/devices/list"))
        .respond_with(ok(devices))
        .mount(server)
        .await;
}

async fn mount_telemetry(server: &MockServer, mac: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .and(body_partial_json(json!({ "bleMac": mac })))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Firmware and info endpoints answer "not found"; they are best-effort.
async fn mount_metadata_missing(server: &MockServer) {
    for endpoint in ["/api/devices/ota/info", "/api/devices/ota/status", "/api/devices/info"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(code(1013, "no record"))
            .mount(server)
            .await;
    }
}

async fn mount_settings(server: &MockServer, blob: Value) {
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/download"))
        .respond_with(ok(blob))
        .mount(server)
        .await;
}

/// A cloud with one device that answers every endpoint.
async fn single_device(server: &MockServer, settings: Value) {
    mount_login(server).await;
    mount_devices(server, json!([{ "bleMac": MAC_A, "name": "Garage" }])).await;
    mount_telemetry(server, MAC_A, ok(json!({ "totalSoc": 875, "dailyGeneration": 12345 }))).await;
    mount_metadata_missing(server).await;
    mount_settings(server, settings).await;
}

/// Settings storage shared by the download and upload mocks, so the
/// server behaves like a device that remembers its last upload.
#[derive(Clone)]
struct FakeSettings(Arc<Mutex<Map<String, Value>>>);

impl FakeSettings {
    fn new(initial: Value) -> Self {
        let Value::Object(map) = initial else {
            panic!("settings must be an object")
        };
        Self(Arc::new(Mutex::new(map)))
    }

    fn current(&self) -> Map<String, Value> {
        self.0.lock().unwrap().clone()
    }
}

struct Download(FakeSettings);

impl Respond for Download {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ok(Value::Object(self.0.current()))
    }
}

struct Upload(FakeSettings);

impl Respond for Upload {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(Value::Object(mut body)) = request.body_json::<Value>() else {
            return code(400, "bad body");
        };
        body.remove("bleMac");
        body.remove("userId");
        *self.0.0.lock().unwrap() = body;
        ok(Value::Null)
    }
}

async fn mount_fake_settings(server: &MockServer, fake: &FakeSettings, uploads: u64) {
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/download"))
        .respond_with(Download(fake.clone()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .respond_with(Upload(fake.clone()))
        .expect(uploads)
        .mount(server)
        .await;
}

// ── Cycle ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cycle_publishes_scaled_snapshot() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 2, "soc": 15, "pricePerKwh": 0.5 })).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let fleet = coordinator.snapshot();
    assert_eq!(fleet.len(), 1);
    let device = fleet.device(&MacAddress::new(MAC_A)).unwrap();
    assert_eq!(device.name, "Garage");
    assert_eq!(device.source, DataSource::Cloud);
    assert_eq!(device.field("soc"), Some(FieldValue::Number(87.5)));
    assert_eq!(device.field("daily_generation"), Some(FieldValue::Number(12.345)));
    assert_eq!(device.field("current_mode"), Some(FieldValue::Integer(2)));
    assert_eq!(device.field("discharge_threshold"), Some(FieldValue::Number(15.0)));
    assert_eq!(device.field("charge_threshold"), Some(FieldValue::Number(90.0)));
    let saved = device.field("daily_cost_saved").unwrap().as_f64().unwrap();
    assert!((saved - 6.1725).abs() < 1e-9, "daily_cost_saved = {saved}");
    assert_eq!(device.field("firmware_version"), None);

    let status = coordinator.update_status();
    assert!(status.is_healthy());
    assert_eq!(status.cycles, 1);
    assert_eq!(coordinator.state(), CoordinatorState::Running);

    coordinator.stop().await;
    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
}

#[tokio::test]
async fn test_failing_device_is_omitted_and_cycle_succeeds() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_devices(&server, json!([{ "bleMac": MAC_A }, { "bleMac": MAC_B }])).await;
    mount_telemetry(&server, MAC_A, code(1002, "device offline")).await;
    mount_telemetry(&server, MAC_B, ok(json!({ "totalSoc": 500 }))).await;
    mount_metadata_missing(&server).await;
    mount_settings(&server, json!({ "mode": 1 })).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let fleet = coordinator.snapshot();
    assert_eq!(fleet.len(), 1);
    assert!(fleet.device(&MacAddress::new(MAC_A)).is_none());
    assert!(fleet.device(&MacAddress::new(MAC_B)).is_some());
    assert_eq!(
        fleet.unavailable.get(&MacAddress::new(MAC_A)),
        Some(&Unavailability::Offline)
    );
    assert!(coordinator.update_status().is_healthy());
    assert_eq!(coordinator.devices().len(), 2);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_device_without_telemetry_is_never_fabricated() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_devices(&server, json!([{ "bleMac": MAC_A }])).await;
    mount_telemetry(&server, MAC_A, code(1013, "no record")).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let fleet = coordinator.snapshot();
    assert!(fleet.is_empty());
    assert_eq!(
        fleet.unavailable.get(&MacAddress::new(MAC_A)),
        Some(&Unavailability::NotFound)
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_empty_device_list_aborts_startup() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_devices(&server, json!([])).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    let result = coordinator.start().await;
    assert!(
        matches!(result, Err(CoreError::NoDevices)),
        "expected NoDevices, got: {result:?}"
    );
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert!(coordinator.snapshot().refreshed_at.is_none());
    assert_eq!(coordinator.update_status().failures, 1);
}

#[tokio::test]
async fn test_rejected_login_aborts_startup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login/email"))
        .respond_with(code(1001, "wrong password"))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    let result = coordinator.start().await;
    assert!(
        matches!(result, Err(CoreError::UpdateFailed { .. })),
        "expected UpdateFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invalid_token_triggers_exactly_one_reauth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login/email"))
        .respond_with(ok(json!({ "token": "tok-old", "userId": 77 })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/user/login/email"))
        .respond_with(ok(json!({ "token": "tok-new", "userId": 77 })))
        .expect(1)
        .mount(&server)
        .await;
    mount_devices(&server, json!([{ "bleMac": MAC_A }])).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .and(header("Authorization", "tok-old"))
        .respond_with(code(1009, "token invalid"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .and(header("Authorization", "tok-new"))
        .respond_with(ok(json!({ "totalSoc": 420 })))
        .expect(1)
        .mount(&server)
        .await;
    mount_metadata_missing(&server).await;
    mount_settings(&server, json!({})).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let device = coordinator.device(&MacAddress::new(MAC_A)).unwrap();
    assert_eq!(device.field("soc"), Some(FieldValue::Number(42.0)));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_requested_refresh_runs_a_cycle() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1 })).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();
    let mut status = coordinator.subscribe_status();

    coordinator.request_refresh();
    tokio::time::timeout(Duration::from_secs(5), status.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.update_status().cycles, 2);

    coordinator.stop().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_parameter_twice_uploads_once_and_keeps_other_fields() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_devices(&server, json!([{ "bleMac": MAC_A }])).await;
    mount_telemetry(&server, MAC_A, ok(json!({ "totalSoc": 875 }))).await;
    mount_metadata_missing(&server).await;

    let initial = json!({
        "mode": 3,
        "bmsPower": 40,
        "soc": 20,
        "maxSoc": 95,
        "pfValue": 10,
        "ctAPower": 300,
        "vendorExtension": { "nested": [1, 2, 3] },
    });
    let fake = FakeSettings::new(initial.clone());
    mount_fake_settings(&server, &fake, 1).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let write = Command::SetConfigParameter {
        mac: MacAddress::new(MAC_A),
        field: "pfValue".into(),
        value: json!(5),
    };
    assert_eq!(coordinator.execute(write.clone()).await.unwrap(), CommandResult::Applied);
    assert_eq!(coordinator.execute(write).await.unwrap(), CommandResult::Unchanged);

    let stored = fake.current();
    assert_eq!(stored.get("pfValue"), Some(&json!(5)));
    for (key, value) in initial.as_object().unwrap() {
        if key != "pfValue" {
            assert_eq!(stored.get(key), Some(value), "field {key} changed");
        }
    }

    coordinator.stop().await;
}

#[tokio::test]
async fn test_set_mode_to_current_mode_skips_upload() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 2, "soc": 10 })).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let result = coordinator
        .execute(Command::SetMode {
            mac: MacAddress::new(MAC_A),
            mode: Mode::MicroInverterPriority,
        })
        .await
        .unwrap();
    assert_eq!(result, CommandResult::Unchanged);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_threshold_write_uploads_full_blob() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1, "soc": 10, "maxSoc": 90 })).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .and(body_partial_json(json!({
            "bleMac": MAC_A,
            "userId": 77,
            "mode": 1,
            "soc": 25,
            "maxSoc": 90,
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let result = coordinator
        .execute(Command::SetDischargeThreshold {
            mac: MacAddress::new("aa-bb-cc-dd-ee-01"),
            pct: 25,
        })
        .await
        .unwrap();
    assert_eq!(result, CommandResult::Applied);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_out_of_range_write_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1 })).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();
    let downloads_before = download_count(&server).await;

    let result = coordinator
        .execute(Command::SetChargeThreshold {
            mac: MacAddress::new(MAC_A),
            pct: 30,
        })
        .await;
    assert!(
        matches!(result, Err(CoreError::ValidationFailed { .. })),
        "expected ValidationFailed, got: {result:?}"
    );
    assert_eq!(download_count(&server).await, downloads_before);

    coordinator.stop().await;
}

async fn download_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/devices/setting/download")
        .count()
}

#[tokio::test]
async fn test_rejected_upload_is_reported() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1, "bmsPower": 50 })).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .respond_with(code(4001, "parameter error"))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let result = coordinator
        .execute(Command::SetOutputPower {
            mac: MacAddress::new(MAC_A),
            pct: 80,
        })
        .await;
    assert!(
        matches!(result, Err(CoreError::Rejected { .. })),
        "expected Rejected, got: {result:?}"
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_write_without_current_settings_never_uploads() {
    let server = MockServer::start().await;
    single_device(&server, Value::Null).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/setting/upload"))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let result = coordinator
        .execute(Command::SetConfigParameter {
            mac: MacAddress::new(MAC_A),
            field: "pfValue".into(),
            value: json!(5),
        })
        .await;
    assert!(
        matches!(result, Err(CoreError::Rejected { .. })),
        "expected Rejected, got: {result:?}"
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_start_and_stop_move_through_states() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1 })).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    assert_eq!(coordinator.state(), CoordinatorState::Idle);

    coordinator.start().await.unwrap();
    assert_eq!(coordinator.state(), CoordinatorState::Running);

    coordinator.stop().await;
    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    let result = coordinator
        .execute(Command::SetMode {
            mac: MacAddress::new(MAC_A),
            mode: Mode::CustomSchedule,
        })
        .await;
    assert!(matches!(result, Err(CoreError::CoordinatorStopped)));
}

#[tokio::test]
async fn test_unknown_device_is_not_found() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 1 })).await;

    let coordinator = Coordinator::new(config(&server)).unwrap();
    coordinator.start().await.unwrap();

    let result = coordinator
        .execute(Command::SetMode {
            mac: MacAddress::new("11:22:33:44:55:66"),
            mode: Mode::CustomSchedule,
        })
        .await;
    assert!(
        matches!(result, Err(CoreError::DeviceNotFound { .. })),
        "expected DeviceNotFound, got: {result:?}"
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_execute_requires_running_coordinator() {
    let server = MockServer::start().await;
    let coordinator = Coordinator::new(config(&server)).unwrap();

    let result = coordinator
        .execute(Command::SetMode {
            mac: MacAddress::new(MAC_A),
            mode: Mode::BatteryPriority,
        })
        .await;
    assert!(matches!(result, Err(CoreError::CoordinatorStopped)));
}

#[tokio::test]
async fn test_oneshot_runs_closure_after_first_refresh() {
    let server = MockServer::start().await;
    single_device(&server, json!({ "mode": 3 })).await;

    let mode = Coordinator::oneshot(config(&server), |coordinator| async move {
        let fleet = coordinator.snapshot();
        let device = fleet.find("aabbccddee01").ok_or(CoreError::NoDevices)?;
        Ok(device.field("current_mode"))
    })
    .await
    .unwrap();
    assert_eq!(mode, Some(FieldValue::Integer(3)));
}

// ── Local transport ─────────────────────────────────────────────────

async fn local_setup(
    transport: TransportMode,
    local_api: bool,
    local_response: ResponseTemplate,
    cloud_telemetry_calls: u64,
) -> (MockServer, MockServer, Coordinator) {
    let cloud = MockServer::start().await;
    let device = MockServer::start().await;

    mount_login(&cloud).await;
    mount_devices(
        &cloud,
        json!([{ "bleMac": MAC_A, "localIp": device.address().to_string() }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .respond_with(ok(json!({ "totalSoc": 100 })))
        .expect(cloud_telemetry_calls)
        .mount(&cloud)
        .await;
    mount_metadata_missing(&cloud).await;
    mount_settings(&cloud, json!({ "mode": 1 })).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .and(body_partial_json(json!({ "bleMac": MAC_A })))
        .respond_with(local_response)
        .mount(&device)
        .await;

    let mut cfg = config(&cloud);
    cfg.transport = transport;
    cfg.local_api = local_api;
    let coordinator = Coordinator::new(cfg).unwrap();
    (cloud, device, coordinator)
}

#[tokio::test]
async fn test_auto_prefers_local_answer() {
    let (_cloud, device_server, coordinator) =
        local_setup(TransportMode::Auto, true, ok(json!({ "totalSoc": 650 })), 0).await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&device_server)
        .await;
    coordinator.start().await.unwrap();

    let device = coordinator.device(&MacAddress::new(MAC_A)).unwrap();
    assert_eq!(device.source, DataSource::Local);
    assert_eq!(device.field("soc"), Some(FieldValue::Number(65.0)));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_auto_falls_back_to_cloud_when_local_fails() {
    let (_cloud, _device, coordinator) =
        local_setup(TransportMode::Auto, true, ResponseTemplate::new(500), 1).await;
    coordinator.start().await.unwrap();

    let device = coordinator.device(&MacAddress::new(MAC_A)).unwrap();
    assert_eq!(device.source, DataSource::Cloud);
    assert_eq!(device.field("soc"), Some(FieldValue::Number(10.0)));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_local_mode_failure_marks_device_unavailable() {
    let (_cloud, _device, coordinator) =
        local_setup(TransportMode::Local, true, ResponseTemplate::new(500), 0).await;
    coordinator.start().await.unwrap();

    let fleet = coordinator.snapshot();
    assert!(fleet.is_empty());
    assert!(matches!(
        fleet.unavailable.get(&MacAddress::new(MAC_A)),
        Some(Unavailability::Failed { .. })
    ));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_local_mode_without_capability_uses_cloud() {
    let (_cloud, _device, coordinator) =
        local_setup(TransportMode::Local, false, ok(json!({ "totalSoc": 650 })), 1).await;
    coordinator.start().await.unwrap();

    let device = coordinator.device(&MacAddress::new(MAC_A)).unwrap();
    assert_eq!(device.source, DataSource::Cloud);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_cloud_mode_never_touches_local_api() {
    let (_cloud, device_server, coordinator) =
        local_setup(TransportMode::Cloud, true, ok(json!({ "totalSoc": 650 })), 1).await;
    coordinator.start().await.unwrap();

    assert_eq!(
        coordinator.device(&MacAddress::new(MAC_A)).unwrap().source,
        DataSource::Cloud
    );
    assert!(device_server.received_requests().await.unwrap().is_empty());

    coordinator.stop().await;
}
