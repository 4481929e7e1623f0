// ── Core error types ──
//
// Two error channels exist in this crate. Per-device validation and
// registration failures are NOT errors here -- they become ledger
// entries (see ledger.rs) and the run continues. `CoreError` is the
// fatal, run-aborting channel only; the CLI renders its cause chain
// as an indented tree before exiting.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A failure wrapped with what the run was doing at the time.
    /// Wraps compose, e.g. "While processing devices" around
    /// "While writing normalized AHU-1" around the leaf cause.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<CoreError>,
    },

    // ── Filesystem ───────────────────────────────────────────────────
    #[error("Cannot read {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot list {}", path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The site has no devices directory at all (distinct from an empty
    /// one, which is a valid zero-device site).
    #[error("No devices found in {}", path.display())]
    MissingDevicesDir { path: PathBuf },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Invalid JSON in {}", path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode {what}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// A schema document failed to compile (bad schema, unresolvable
    /// sub-schema reference).
    #[error("Invalid schema {name}: {message}")]
    Schema { name: String, message: String },

    #[error("Invalid device filter {pattern:?}")]
    Filter {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    // ── Reconciliation invariants ────────────────────────────────────
    /// Re-fetch after a successful register found no device entry.
    #[error("missing device {0}")]
    MissingDevice(String),

    /// The registry returned a device entry without a numeric id.
    #[error("missing deviceNumId for {0}")]
    MissingNumId(String),

    // ── Collaborators ────────────────────────────────────────────────
    /// Registry or publisher failure, surfaced with its own chain.
    #[error(transparent)]
    Api(#[from] sitereg_api::Error),
}

impl CoreError {
    /// Wrap an error with a "While ..." context frame.
    pub fn context(context: impl Into<String>, source: CoreError) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        Self::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: io::Error) -> Self {
        Self::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::ParseJson {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Join an error and its causes into one `": "`-separated line, the
/// form stored in per-device ledger entries.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut line = err.to_string();
    let mut cursor = err.source();
    while let Some(cause) = cursor {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        cursor = cause.source();
    }
    line
}

/// Indented rendering of a fatal error and its cause chain, built once
/// when the run aborts.
#[derive(Debug)]
pub struct ErrorTree {
    messages: Vec<String>,
}

impl ErrorTree {
    /// Collect the error and every transitive cause, outermost first.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut messages = vec![err.to_string()];
        let mut cursor = err.source();
        while let Some(cause) = cursor {
            messages.push(cause.to_string());
            cursor = cause.source();
        }
        Self { messages }
    }

    /// Render with two-space indentation per cause level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, message) in self.messages.iter().enumerate() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(message);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
