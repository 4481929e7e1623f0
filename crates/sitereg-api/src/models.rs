// Wire types for the registry and publisher services.
//
// Every response struct uses `#[serde(default)]` on optional fields so
// partial server responses deserialize rather than erroring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of the registry a client operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    pub project_id: String,
    pub registry_id: String,
    pub site_name: String,
}

/// Device record as the registry reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDevice {
    /// Device name, unique within the registry.
    pub id: String,
    /// Server-assigned numeric id. Absent on some partial listings.
    #[serde(default)]
    pub num_id: Option<u64>,
    /// Whether the registry currently refuses traffic from the device.
    #[serde(default)]
    pub blocked: bool,
    /// Fields this tool does not consume, preserved for debugging.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response shape of `GET /v1/registries/{registry}/devices`.
#[derive(Debug, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<RemoteDevice>,
}

/// Public key credential attached to a device at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// Key format identifier, e.g. `RSA_PEM`.
    pub key_format: String,
    /// Key material in PEM form.
    pub key: String,
}

/// Request body for `PUT /v1/registries/{registry}/devices/{name}`.
#[derive(Debug, Clone, Serialize)]
pub struct DevicePayload {
    pub credential: DeviceCredential,
    /// Device metadata stored alongside the registry entry.
    pub metadata: serde_json::Value,
}

/// Request body for `POST /v1/topics/{topic}/messages`.
///
/// Attributes use a sorted map so serialized requests are byte-stable.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    pub attributes: BTreeMap<String, String>,
    /// Base64-encoded message payload.
    pub data: String,
}
