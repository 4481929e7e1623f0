// Integration tests for the registry reconciler using wiremock.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitereg_api::{Publisher, RegistryClient, RegistryInfo, Transport};
use sitereg_core::device::LocalDevice;
use sitereg_core::error::error_chain;
use sitereg_core::loader::DeviceFilter;
use sitereg_core::reconcile::reconcile;
use sitereg_core::Category;

// ── Helpers ─────────────────────────────────────────────────────────

const REGISTRY: &str = "ZZ-TRI-FECTA";
const PROJECT: &str = "test-project";
const TOPIC: &str = "registrations";

async fn setup() -> (MockServer, RegistryClient, Publisher) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let info = RegistryInfo {
        project_id: PROJECT.into(),
        registry_id: REGISTRY.into(),
        site_name: REGISTRY.into(),
    };
    let token = SecretString::from("test-token".to_string());
    let transport = Transport::default();
    let registry = RegistryClient::new(base.clone(), info, &token, &transport).unwrap();
    let publisher = Publisher::new(base, TOPIC, &token, &transport).unwrap();
    (server, registry, publisher)
}

fn seed_device(devices_dir: &Path, name: &str) -> LocalDevice {
    let dir = devices_dir.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("metadata.json"),
        json!({ "system": { "location": { "site": REGISTRY } } }).to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("properties.json"),
        json!({ "key_type": "RS256" }).to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("rsa_public.pem"),
        format!("-----BEGIN PUBLIC KEY-----\n{name}\n-----END PUBLIC KEY-----\n"),
    )
    .unwrap();
    LocalDevice::load(devices_dir, name).unwrap()
}

fn seed_devices(devices_dir: &Path, names: &[&str]) -> BTreeMap<String, LocalDevice> {
    names
        .iter()
        .map(|name| ((*name).to_string(), seed_device(devices_dir, name)))
        .collect()
}

fn devices_path() -> String {
    format!("/v1/registries/{REGISTRY}/devices")
}

fn device_path(name: &str) -> String {
    format!("{}/{name}", devices_path())
}

async fn mock_list(server: &MockServer, ids: &[&str]) {
    let devices: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
    Mock::given(method("GET"))
        .and(path(devices_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({ "devices": devices })))
        .mount(server)
        .await;
}

async fn mock_register(server: &MockServer, name: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(device_path(name)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn mock_fetch(server: &MockServer, name: &str, num_id: u64) {
    Mock::given(method("GET"))
        .and(path(device_path(name)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&json!({ "id": name, "num_id": num_id })),
        )
        .mount(server)
        .await;
}

async fn mock_publish(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/topics/{TOPIC}/messages")))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn match_all() -> DeviceFilter {
    DeviceFilter::new("").unwrap()
}

// ── Convergence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_creates_updates_and_blocks() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1", "dev-2"]);

    mock_list(&server, &["dev-2", "dev-9"]).await;
    mock_register(&server, "dev-1", 201).await;
    mock_register(&server, "dev-2", 200).await;
    mock_fetch(&server, "dev-1", 271).await;
    mock_fetch(&server, "dev-2", 272).await;
    mock_publish(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("{}/block", device_path("dev-9"))))
        .and(body_json(json!({ "blocked": true })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();

    assert_eq!(devices["dev-1"].num_id(), Some(271));
    assert_eq!(devices["dev-2"].num_id(), Some(272));
    assert!(devices.values().all(|device| device.errors().is_empty()));
    assert_eq!(publisher.messages_sent(), 2);
}

#[tokio::test]
async fn test_publish_attributes_carry_device_identity() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1"]);

    mock_list(&server, &[]).await;
    mock_register(&server, "dev-1", 201).await;
    mock_fetch(&server, "dev-1", 271).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/topics/{TOPIC}/messages")))
        .and(body_partial_json(json!({
            "attributes": {
                "deviceId": "dev-1",
                "deviceNumId": "271",
                "deviceRegistryId": REGISTRY,
                "projectId": PROJECT,
                "subFolder": "metadata",
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();
    assert!(devices["dev-1"].errors().is_empty());
}

#[tokio::test]
async fn test_second_run_converges_without_creates() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();

    mock_list(&server, &["dev-1"]).await;
    mock_register(&server, "dev-1", 200).await;
    mock_fetch(&server, "dev-1", 271).await;
    mock_publish(&server).await;

    let mut first = seed_devices(dir.path(), &["dev-1"]);
    reconcile(&registry, &publisher, &match_all(), &mut first)
        .await
        .unwrap();

    let mut second = seed_devices(dir.path(), &["dev-1"]);
    reconcile(&registry, &publisher, &match_all(), &mut second)
        .await
        .unwrap();

    assert_eq!(second["dev-1"].num_id(), Some(271));
    assert!(second["dev-1"].errors().is_empty());
    assert_eq!(publisher.messages_sent(), 2);
}

// ── Per-device failure isolation ────────────────────────────────────

#[tokio::test]
async fn test_registering_failure_is_isolated() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1", "dev-2"]);

    mock_list(&server, &[]).await;
    Mock::given(method("PUT"))
        .and(path(device_path("dev-1")))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(&json!({ "error": { "message": "backend on fire" } })),
        )
        .mount(&server)
        .await;
    mock_register(&server, "dev-2", 200).await;
    mock_fetch(&server, "dev-2", 272).await;
    mock_publish(&server).await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();

    let recorded = &devices["dev-1"].errors()[&Category::Registering];
    assert!(
        recorded.contains("API error (HTTP 500): backend on fire"),
        "{recorded}"
    );
    assert_eq!(devices["dev-1"].num_id(), None);

    assert!(devices["dev-2"].errors().is_empty());
    assert_eq!(devices["dev-2"].num_id(), Some(272));
    assert_eq!(publisher.messages_sent(), 1);
}

#[tokio::test]
async fn test_missing_num_id_is_deferred() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1"]);

    mock_list(&server, &[]).await;
    mock_register(&server, "dev-1", 200).await;
    Mock::given(method("GET"))
        .and(path(device_path("dev-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({ "id": "dev-1" })))
        .mount(&server)
        .await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();

    assert_eq!(
        devices["dev-1"].errors()[&Category::Registering],
        "missing deviceNumId for dev-1"
    );
    assert_eq!(publisher.messages_sent(), 0);
}

#[tokio::test]
async fn test_vanished_device_is_deferred() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1"]);

    mock_list(&server, &[]).await;
    mock_register(&server, "dev-1", 200).await;
    Mock::given(method("GET"))
        .and(path(device_path("dev-1")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();

    assert_eq!(
        devices["dev-1"].errors()[&Category::Registering],
        "missing device dev-1"
    );
}

#[tokio::test]
async fn test_publish_failure_is_deferred() {
    let (server, registry, publisher) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let mut devices = seed_devices(dir.path(), &["dev-1"]);

    mock_list(&server, &[]).await;
    mock_register(&server, "dev-1", 200).await;
    mock_fetch(&server, "dev-1", 271).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/topics/{TOPIC}/messages")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap();

    let recorded = &devices["dev-1"].errors()[&Category::Registering];
    assert!(recorded.contains("API error (HTTP 503)"), "{recorded}");
    // The fetch preceded the failed publish, so the id still sticks.
    assert_eq!(devices["dev-1"].num_id(), Some(271));
    assert_eq!(publisher.messages_sent(), 0);
}

// ── Blocking ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_block_failure_aborts_the_run() {
    let (server, registry, publisher) = setup().await;
    let mut devices = BTreeMap::new();

    mock_list(&server, &["dev-9"]).await;
    Mock::given(method("POST"))
        .and(path(format!("{}/block", device_path("dev-9"))))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = reconcile(&registry, &publisher, &match_all(), &mut devices)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "While blocking dev-9");
    assert!(
        error_chain(&err).contains("API error (HTTP 503)"),
        "{}",
        error_chain(&err)
    );
}

#[tokio::test]
async fn test_extra_devices_respect_filter() {
    let (server, registry, publisher) = setup().await;
    let mut devices = BTreeMap::new();

    // FAN-9 falls outside the filter; blocking it would hit an
    // unmocked route and fail the run.
    mock_list(&server, &["AHU-9", "FAN-9"]).await;
    Mock::given(method("POST"))
        .and(path(format!("{}/block", device_path("AHU-9"))))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let filter = DeviceFilter::new("^AHU").unwrap();
    reconcile(&registry, &publisher, &filter, &mut devices)
        .await
        .unwrap();
}
