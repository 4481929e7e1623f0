//! Reconciliation engine between on-disk site models and the device
//! registry service, sitting under the `sitereg` CLI.
//!
//! This crate owns the business logic of a run:
//!
//! - **[`Registrar`]** — Facade over one reconciliation run.
//!   [`setup()`](Registrar::setup) reads credentials, site config, and
//!   schemas and builds the HTTP clients;
//!   [`process_devices()`](Registrar::process_devices) loads, validates,
//!   and converges the registry; the ledger methods flush per-device
//!   error artifacts and the run summary.
//!
//! - **[`LocalDevice`]** — One device declaration read from
//!   `devices/<name>/`: metadata, properties, public key, plus the
//!   per-device error ledger accumulated during the run.
//!
//! - **[`SchemaStore`]** — The three JSON schemas (metadata, envelope,
//!   properties) compiled once at setup, with `file:` sub-schema
//!   references resolved against the schema directory.
//!
//! - **[`CoreError`]** / **[`ErrorTree`]** — Fatal failures as a chain
//!   of context frames, rendered as an indented tree for operators.
//!
//! Per-device problems never surface as `CoreError`; they land in the
//! device's ledger under a [`Category`] and the run keeps going.

pub mod config;
pub mod device;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod reconcile;
pub mod registrar;
pub mod schema;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credentials, RegistryConfig, SitePaths};
pub use device::LocalDevice;
pub use error::{CoreError, ErrorTree, error_chain};
pub use ledger::{Category, DeviceErrors, Summary};
pub use loader::DeviceFilter;
pub use registrar::Registrar;
pub use schema::{SchemaKind, SchemaStore};
