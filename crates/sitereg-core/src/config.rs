// ── Run configuration ──
//
// Everything a run reads from disk before touching any device: the
// credential token and the site's registry_config.json. Both are
// loaded once at setup into explicit structs and passed by reference
// into the loader/reconciler -- no ambient global state.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::CoreError;

/// Registry configuration file name, under the site directory.
pub const REGISTRY_CONFIG_JSON: &str = "registry_config.json";

/// Run summary file name, under the site directory.
pub const SUMMARY_JSON: &str = "registration_summary.json";

/// Subdirectory of the site holding one directory per device.
pub const DEVICES_DIR: &str = "devices";

/// Bearer credential loaded from the credentials file.
///
/// The token is held as a `SecretString` so debug output and logs
/// never reveal it.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub token: SecretString,
}

impl Credentials {
    /// Read and parse a credentials file: `{ "token": "..." }`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path).map_err(|source| CoreError::read(path, source))?;
        serde_json::from_str(&raw).map_err(|source| CoreError::json(path, source))
    }
}

/// Contents of `<site>/registry_config.json`, read once at setup.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URL for both the registry and publisher services.
    pub endpoint: Url,
    pub project_id: String,
    pub registry_id: String,
    pub site_name: String,
    /// Topic that receives device metadata messages.
    pub topic: String,
}

impl RegistryConfig {
    /// Read the registry configuration from its fixed path under the
    /// site directory.
    pub fn load(site: &SitePaths) -> Result<Self, CoreError> {
        let path = site.registry_config();
        tracing::info!(path = %path.display(), "reading registry config");
        let raw = fs::read_to_string(&path).map_err(|source| CoreError::read(&path, source))?;
        serde_json::from_str(&raw).map_err(|source| CoreError::json(&path, source))
    }
}

/// Layout of one site directory.
#[derive(Debug, Clone)]
pub struct SitePaths {
    root: PathBuf,
}

impl SitePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_config(&self) -> PathBuf {
        self.root.join(REGISTRY_CONFIG_JSON)
    }

    pub fn summary_file(&self) -> PathBuf {
        self.root.join(SUMMARY_JSON)
    }

    pub fn devices_dir(&self) -> PathBuf {
        self.root.join(DEVICES_DIR)
    }

    pub fn device_dir(&self, name: &str) -> PathBuf {
        self.devices_dir().join(name)
    }
}
