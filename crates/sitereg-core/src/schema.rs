// ── Schema store ──
//
// Loads the three contract schemas from the schema directory once at
// setup and compiles them into reusable validators. Sub-schemas are
// referenced with a `file:` prefix and resolve relative to the same
// directory through a retriever callback, which keeps resolution a
// pure (schema_dir, reference) -> document lookup.

use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;

/// Schema for device metadata documents.
pub const METADATA_SCHEMA: &str = "metadata.json";
/// Schema for the message envelope synthesized per device.
pub const ENVELOPE_SCHEMA: &str = "envelope.json";
/// Schema for device properties documents.
pub const PROPERTIES_SCHEMA: &str = "properties.json";

/// The three schema contracts every schema directory must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Metadata,
    Envelope,
    Properties,
}

impl SchemaKind {
    /// File name of this schema inside the schema directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Metadata => METADATA_SCHEMA,
            Self::Envelope => ENVELOPE_SCHEMA,
            Self::Properties => PROPERTIES_SCHEMA,
        }
    }
}

/// Compiled validators for the three contract schemas.
#[derive(Debug)]
pub struct SchemaStore {
    metadata: Validator,
    envelope: Validator,
    properties: Validator,
}

impl SchemaStore {
    /// Load and compile all three schemas from `schema_dir`.
    pub fn load(schema_dir: &Path) -> Result<Self, CoreError> {
        debug!(dir = %schema_dir.display(), "loading schemas");
        Ok(Self {
            metadata: compile(schema_dir, METADATA_SCHEMA)?,
            envelope: compile(schema_dir, ENVELOPE_SCHEMA)?,
            properties: compile(schema_dir, PROPERTIES_SCHEMA)?,
        })
    }

    /// Validate `instance` against one schema. On failure the error
    /// lists every violation, qualified by its instance path.
    pub fn validate(&self, kind: SchemaKind, instance: &Value) -> Result<(), String> {
        let violations: Vec<String> = self
            .validator(kind)
            .iter_errors(instance)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{path}: {error}")
                }
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "schema {}: {}",
                kind.file_name(),
                violations.join("; ")
            ))
        }
    }

    fn validator(&self, kind: SchemaKind) -> &Validator {
        match kind {
            SchemaKind::Metadata => &self.metadata,
            SchemaKind::Envelope => &self.envelope,
            SchemaKind::Properties => &self.properties,
        }
    }
}

fn compile(schema_dir: &Path, name: &str) -> Result<Validator, CoreError> {
    let path = schema_dir.join(name);
    let build = || -> Result<Validator, CoreError> {
        let raw = fs::read_to_string(&path).map_err(|source| CoreError::read(&path, source))?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|source| CoreError::json(&path, source))?;
        jsonschema::options()
            .with_retriever(DirRetriever::new(schema_dir))
            .build(&document)
            .map_err(|err| CoreError::Schema {
                name: name.to_string(),
                message: err.to_string(),
            })
    };
    build().map_err(|err| CoreError::context(format!("While loading schema {}", path.display()), err))
}

/// Resolves `file:`-prefixed sub-schema references against one base
/// directory. Any other reference scheme is rejected.
#[derive(Debug)]
struct DirRetriever {
    base: PathBuf,
}

impl DirRetriever {
    fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }
}

impl Retrieve for DirRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let raw = uri.as_str();
        let relative = raw
            .strip_prefix("file:")
            .ok_or_else(|| format!("unsupported sub-schema reference {raw}"))?
            .trim_start_matches('/');
        let path = self.base.join(relative);
        let text = fs::read_to_string(&path)
            .map_err(|err| format!("While loading sub-schema {raw}: {err}"))?;
        Ok(serde_json::from_str(&text)?)
    }
}
