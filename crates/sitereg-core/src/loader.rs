// ── Local device loader ──
//
// Discovers device declarations under <site>/devices, applies the
// name filter, and runs the validation pipeline: load (fatal on
// malformed declarations), envelope check, credential uniqueness,
// file-set check (each isolated per device), then canonical
// rewriting of every declaration (fatal on failure). Devices that
// fail an isolated check stay in the map so later stages can still
// attempt partial processing.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;

use regex::Regex;
use tracing::{debug, info};

use crate::config::SitePaths;
use crate::device::LocalDevice;
use crate::error::CoreError;
use crate::ledger::Category;
use crate::schema::{SchemaKind, SchemaStore};

/// Device-name filter with search (not full-match) semantics: the
/// pattern may hit anywhere in the name, and an empty pattern matches
/// every name. Anchors opt back into exact matching.
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    regex: Regex,
}

impl DeviceFilter {
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        let regex = Regex::new(pattern).map_err(|source| CoreError::Filter {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Load, validate, and normalize the site's device declarations.
///
/// Output is keyed by device name; `BTreeMap` pins every later pass
/// (and all artifacts) to lexicographic device order. Isolated
/// validation failures are recorded on each device's ledger entry,
/// never returned as `Err`.
pub fn load_local_devices(
    site: &SitePaths,
    schemas: &SchemaStore,
    filter: &DeviceFilter,
    registry_id: &str,
    project_id: &str,
) -> Result<BTreeMap<String, LocalDevice>, CoreError> {
    let devices_dir = site.devices_dir();
    if !devices_dir.is_dir() {
        return Err(CoreError::MissingDevicesDir { path: devices_dir });
    }

    let mut names = Vec::new();
    let entries = fs::read_dir(&devices_dir).map_err(|source| CoreError::ListDir {
        path: devices_dir.clone(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| CoreError::ListDir {
            path: devices_dir.clone(),
            source,
        })?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let mut devices = BTreeMap::new();
    for name in names {
        if !filter.matches(&name) {
            continue;
        }
        if !LocalDevice::exists(&devices_dir, &name) {
            debug!(entry = %name, "skipping non-device entry");
            continue;
        }
        info!(device = %name, "loading local device");
        let mut device = LocalDevice::load(&devices_dir, &name)
            .map_err(|err| CoreError::context(format!("While loading device {name}"), err))?;
        let envelope = device.envelope(registry_id, project_id);
        if let Err(message) = schemas.validate(SchemaKind::Envelope, &envelope) {
            device.record_error(Category::Envelope, message);
        }
        devices.insert(name, device);
    }

    validate_keys(&mut devices);
    validate_files(schemas, &mut devices);
    write_normalized(&devices)?;
    Ok(devices)
}

/// Credential uniqueness over the whole map, in map order. The first
/// holder of a fingerprint is never flagged; every later holder gets
/// a `Key` error naming the first.
fn validate_keys(devices: &mut BTreeMap<String, LocalDevice>) {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let names: Vec<String> = devices.keys().cloned().collect();
    for name in names {
        let Some(device) = devices.get_mut(&name) else {
            continue;
        };
        match seen.entry(device.credential_fingerprint()) {
            Entry::Occupied(first) => {
                let message = format!("Duplicate credentials found for {} & {name}", first.get());
                device.record_error(Category::Key, message);
            }
            Entry::Vacant(slot) => {
                slot.insert(name.clone());
            }
        }
    }
}

/// File-structure and content validation, isolated per device: the
/// directory must hold exactly the expected files, and the metadata
/// and properties documents must satisfy their schemas.
fn validate_files(schemas: &SchemaStore, devices: &mut BTreeMap<String, LocalDevice>) {
    for device in devices.values_mut() {
        let mut problems = Vec::new();
        if let Err(message) = device.check_expected_files() {
            problems.push(message);
        }
        if let Err(message) = schemas.validate(SchemaKind::Metadata, device.metadata()) {
            problems.push(message);
        }
        if let Err(message) = schemas.validate(SchemaKind::Properties, device.properties()) {
            problems.push(message);
        }
        if !problems.is_empty() {
            device.record_error(Category::Files, problems.join("; "));
        }
    }
}

/// Canonical rewrite of every declaration. Any failure aborts the run
/// before registry traffic starts.
fn write_normalized(devices: &BTreeMap<String, LocalDevice>) -> Result<(), CoreError> {
    for (name, device) in devices {
        info!(device = %name, "writing normalized device");
        device
            .write_normalized()
            .map_err(|err| CoreError::context(format!("While writing normalized {name}"), err))?;
    }
    Ok(())
}
