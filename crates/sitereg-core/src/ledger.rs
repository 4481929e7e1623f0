// ── Error ledger ──
//
// Per-device, per-category error accumulation and the end-of-run
// summary artifacts. No validation logic lives here: the loader and
// reconciler decide WHAT failed; this module records and reports.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::device::DEVICE_ERRORS_JSON;
use crate::error::CoreError;

/// Per-device failure categories. The rendered strings are ledger keys
/// in errors.json and the run summary, so they never change casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Category {
    Envelope,
    Files,
    Key,
    Registering,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Envelope => "Envelope",
            Self::Files => "Files",
            Self::Key => "Key",
            Self::Registering => "Registering",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic summary category for devices with no recorded errors.
pub const CLEAN_CATEGORY: &str = "Clean";

/// Marker value recorded for clean devices.
pub const CLEAN_MARKER: &str = "true";

/// One device's recorded failures: category -> cause message.
pub type DeviceErrors = BTreeMap<Category, String>;

/// The run summary document: category -> (device name -> message).
/// `BTreeMap` keeps both levels sorted, so the artifact is byte-stable
/// across runs. "Clean" sorts before every real category.
pub type Summary = BTreeMap<String, BTreeMap<String, String>>;

/// Build the summary over every loaded device. A device lands in
/// `Clean` exactly when its error set is empty, and in each real
/// category exactly when that category was recorded for it.
pub fn build_summary<'a, I>(devices: I) -> Summary
where
    I: IntoIterator<Item = (&'a str, &'a DeviceErrors)>,
{
    let mut summary = Summary::new();
    for (name, errors) in devices {
        if errors.is_empty() {
            summary
                .entry(CLEAN_CATEGORY.to_string())
                .or_default()
                .insert(name.to_string(), CLEAN_MARKER.to_string());
        } else {
            for (category, message) in errors {
                summary
                    .entry(category.to_string())
                    .or_default()
                    .insert(name.to_string(), message.clone());
            }
        }
    }
    summary
}

/// Per-category diagnostic lines: `Device <category>: <count>` for
/// every summary category in sorted order, then `Out of <n> total.`.
pub fn count_lines(summary: &Summary, total: usize) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .iter()
        .map(|(category, devices)| format!("Device {category}: {}", devices.len()))
        .collect();
    lines.push(format!("Out of {total} total."));
    lines
}

/// Shape of the per-device errors.json artifact.
#[derive(Debug, Serialize)]
struct ErrorsArtifact<'a> {
    /// When the artifact was written, RFC 3339.
    written: String,
    errors: &'a DeviceErrors,
}

/// Write `<device_dir>/errors.json` for one device. Clean devices get
/// an empty error map, which doubles as the clean marker on disk.
pub fn write_device_errors(device_dir: &Path, errors: &DeviceErrors) -> Result<(), CoreError> {
    let artifact = ErrorsArtifact {
        written: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        errors,
    };
    let path = device_dir.join(DEVICE_ERRORS_JSON);
    let body = serde_json::to_string_pretty(&artifact).map_err(|source| CoreError::Encode {
        what: format!("device errors for {}", device_dir.display()),
        source,
    })?;
    fs::write(&path, body + "\n").map_err(|source| CoreError::write(&path, source))
}

/// Write the run summary artifact.
pub fn write_summary(path: &Path, summary: &Summary) -> Result<(), CoreError> {
    let body = serde_json::to_string_pretty(summary).map_err(|source| CoreError::Encode {
        what: "registration summary".to_string(),
        source,
    })?;
    fs::write(path, body + "\n").map_err(|source| CoreError::write(path, source))
}
