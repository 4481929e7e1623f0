// ── Local device model ──
//
// One `LocalDevice` per directory under `<site>/devices/`. The loader
// decides which directories become devices and which validation
// categories they fail; this module owns the on-disk declaration
// format itself: reading, credential fingerprinting, envelope
// synthesis, file-set checks, and canonical rewriting.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use sitereg_api::{DeviceCredential, DevicePayload};

use crate::error::CoreError;
use crate::ledger::{Category, DeviceErrors};

/// Device metadata document, the publish payload.
pub const METADATA_JSON: &str = "metadata.json";
/// Device properties document; `key_type` selects the credential format.
pub const PROPERTIES_JSON: &str = "properties.json";
/// Public key material registered with the device entry.
pub const RSA_PUBLIC_PEM: &str = "rsa_public.pem";
/// Per-device error artifact from this (or a prior) run.
pub const DEVICE_ERRORS_JSON: &str = "errors.json";

/// Attribute value and envelope subFolder for metadata messages.
pub const METADATA_SUBFOLDER: &str = "metadata";

/// A device declaration loaded from the site tree.
///
/// Carries its own error ledger entry; validation stages record into
/// it without aborting the load of other devices.
#[derive(Debug)]
pub struct LocalDevice {
    name: String,
    dir: PathBuf,
    metadata: Value,
    properties: Value,
    key_type: String,
    key_pem: String,
    num_id: Option<u64>,
    errors: DeviceErrors,
}

impl LocalDevice {
    /// Whether `name` under `devices_dir` is a well-formed declaration
    /// candidate. Names failing this are silently skipped by the
    /// loader -- they are not device records at all.
    pub fn exists(devices_dir: &Path, name: &str) -> bool {
        let dir = devices_dir.join(name);
        dir.is_dir() && dir.join(METADATA_JSON).is_file()
    }

    /// Read a declaration off disk. Failures here are fatal to the
    /// run; the loader wraps them with the device name.
    pub fn load(devices_dir: &Path, name: &str) -> Result<Self, CoreError> {
        let dir = devices_dir.join(name);
        let metadata = read_json(&dir.join(METADATA_JSON))?;
        let properties = read_json(&dir.join(PROPERTIES_JSON))?;
        let doc: PropertiesDoc = serde_json::from_value(properties.clone())
            .map_err(|source| CoreError::json(&dir.join(PROPERTIES_JSON), source))?;
        let key_path = dir.join(RSA_PUBLIC_PEM);
        let key_pem =
            fs::read_to_string(&key_path).map_err(|source| CoreError::read(&key_path, source))?;
        Ok(Self {
            name: name.to_string(),
            dir,
            metadata,
            properties,
            key_type: doc.key_type,
            key_pem,
            num_id: None,
            errors: DeviceErrors::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The metadata document published after registration.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// The properties document, for schema validation.
    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn num_id(&self) -> Option<u64> {
        self.num_id
    }

    /// Store the registry-assigned numeric id.
    pub fn set_num_id(&mut self, num_id: u64) {
        self.num_id = Some(num_id);
    }

    pub fn errors(&self) -> &DeviceErrors {
        &self.errors
    }

    /// Record a categorized failure for this device. Later records for
    /// the same category overwrite earlier ones.
    pub fn record_error(&mut self, category: Category, message: impl Into<String>) {
        self.errors.insert(category, message.into());
    }

    /// Registration payload: credential plus the metadata document.
    pub fn settings(&self) -> DevicePayload {
        DevicePayload {
            credential: DeviceCredential {
                key_format: self.key_type.clone(),
                key: self.key_pem.clone(),
            },
            metadata: self.metadata.clone(),
        }
    }

    /// Stable fingerprint of the credential (format + key material).
    /// Two devices sharing a fingerprint share a credential.
    pub fn credential_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key_type.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.key_pem.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Synthesize the message envelope this device would publish
    /// under, for validation against the envelope schema.
    pub fn envelope(&self, registry_id: &str, project_id: &str) -> Value {
        json!({
            "deviceId": self.name,
            "deviceRegistryId": registry_id,
            "projectId": project_id,
            "subFolder": METADATA_SUBFOLDER,
        })
    }

    /// Check the declaration directory holds exactly the expected
    /// files: the three declaration files, plus optionally a previous
    /// run's errors.json.
    pub fn check_expected_files(&self) -> Result<(), String> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| format!("Cannot list {}: {err}", self.dir.display()))?;
        let mut found = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|err| format!("Cannot list {}: {err}", self.dir.display()))?;
            found.insert(entry.file_name().to_string_lossy().into_owned());
        }

        let mut problems = Vec::new();
        for required in [METADATA_JSON, PROPERTIES_JSON, RSA_PUBLIC_PEM] {
            if !found.remove(required) {
                problems.push(format!("missing file {required}"));
            }
        }
        found.remove(DEVICE_ERRORS_JSON);
        for unexpected in found {
            problems.push(format!("unexpected file {unexpected}"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    /// Rewrite metadata.json in canonical form: sorted keys, two-space
    /// indentation, trailing newline.
    pub fn write_normalized(&self) -> Result<(), CoreError> {
        let path = self.dir.join(METADATA_JSON);
        let body = serde_json::to_string_pretty(&self.metadata).map_err(|source| {
            CoreError::Encode {
                what: format!("metadata for {}", self.name),
                source,
            }
        })?;
        fs::write(&path, body + "\n").map_err(|source| CoreError::write(&path, source))
    }
}

/// Required fields of properties.json; the full document stays a
/// `Value` for schema validation.
#[derive(Debug, serde::Deserialize)]
struct PropertiesDoc {
    key_type: String,
}

fn read_json(path: &Path) -> Result<Value, CoreError> {
    let raw = fs::read_to_string(path).map_err(|source| CoreError::read(path, source))?;
    serde_json::from_str(&raw).map_err(|source| CoreError::json(path, source))
}
