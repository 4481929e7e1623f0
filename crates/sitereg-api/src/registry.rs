// Client for the device registry REST API.
//
// All endpoints live under /v1/registries/{registry}/; callers deal in
// bare device names and typed models, never raw paths or JSON.

use reqwest::StatusCode;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{preview, Error};
use crate::models::{DeviceList, DevicePayload, RegistryInfo, RemoteDevice};
use crate::transport::{ensure_trailing_slash, Transport};

/// Async client for one registry within the device management service.
///
/// All device paths are scoped to the registry named in [`RegistryInfo`];
/// callers pass bare device names.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Url,
    info: RegistryInfo,
}

impl RegistryClient {
    /// Connect to the registry at `base_url` with a bearer `token`.
    pub fn new(
        base_url: Url,
        info: RegistryInfo,
        token: &SecretString,
        transport: &Transport,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self::with_client(http, base_url, info))
    }

    /// Build a client from an existing `reqwest::Client`.
    ///
    /// The client must already carry authentication headers.
    pub fn with_client(http: reqwest::Client, base_url: Url, info: RegistryInfo) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
            info,
        }
    }

    /// Project the registry belongs to.
    pub fn project_id(&self) -> &str {
        &self.info.project_id
    }

    /// Registry this client is scoped to.
    pub fn registry_id(&self) -> &str {
        &self.info.registry_id
    }

    /// Human-readable site name for the registry.
    pub fn site_name(&self) -> &str {
        &self.info.site_name
    }

    /// List every device the registry knows about.
    pub async fn list_devices(&self) -> Result<Vec<RemoteDevice>, Error> {
        let url = self.devices_url()?;
        debug!(registry = %self.info.registry_id, "listing registry devices");
        let response = self.http.get(url).send().await?;
        let list: DeviceList = handle_response(response).await?;
        debug!(count = list.devices.len(), "registry devices fetched");
        Ok(list.devices)
    }

    /// Fetch one device by name, or `None` when the registry has no entry.
    pub async fn fetch_device(&self, name: &str) -> Result<Option<RemoteDevice>, Error> {
        let url = self.device_url(name)?;
        debug!(device = name, "fetching registry device");
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let device: RemoteDevice = handle_response(response).await?;
        Ok(Some(device))
    }

    /// Create or replace a device entry. Returns `true` when the entry was
    /// newly created and `false` when an existing entry was updated.
    pub async fn register_device(&self, name: &str, payload: &DevicePayload) -> Result<bool, Error> {
        let url = self.device_url(name)?;
        debug!(device = name, "registering device");
        let response = self.http.put(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(status == StatusCode::CREATED)
    }

    /// Set or clear the blocked flag on a device.
    pub async fn block_device(&self, name: &str, blocked: bool) -> Result<(), Error> {
        let url = self.block_url(name)?;
        debug!(device = name, blocked, "updating device block state");
        let response = self
            .http
            .post(url)
            .json(&json!({ "blocked": blocked }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(())
    }

    fn devices_url(&self) -> Result<Url, Error> {
        let path = format!("v1/registries/{}/devices", self.info.registry_id);
        Ok(self.base_url.join(&path)?)
    }

    fn device_url(&self, name: &str) -> Result<Url, Error> {
        let path = format!("v1/registries/{}/devices/{}", self.info.registry_id, name);
        Ok(self.base_url.join(&path)?)
    }

    fn block_url(&self, name: &str) -> Result<Url, Error> {
        let path = format!(
            "v1/registries/{}/devices/{}/block",
            self.info.registry_id, name
        );
        Ok(self.base_url.join(&path)?)
    }
}

/// Decode a JSON response body, converting error statuses and malformed
/// bodies into [`Error`] values that keep enough context to debug.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::from_response(response).await);
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| Error::Deserialization {
        message: err.to_string(),
        body: preview(&body),
    })
}
