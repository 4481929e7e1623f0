// ── Run facade ──
//
// Owns every collaborator for one reconciliation run: site paths,
// registry config, compiled schemas, HTTP clients, and the loaded
// device map. The CLI drives it through a fixed sequence: setup ->
// process_devices -> ledger flush -> shutdown.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use sitereg_api::{Publisher, RegistryClient, RegistryInfo, Transport};

use crate::config::{Credentials, RegistryConfig, SitePaths};
use crate::device::LocalDevice;
use crate::error::CoreError;
use crate::ledger::{self, Summary};
use crate::loader::{load_local_devices, DeviceFilter};
use crate::reconcile::reconcile;
use crate::schema::SchemaStore;

/// One reconciliation run against one site.
#[derive(Debug)]
pub struct Registrar {
    site: SitePaths,
    config: RegistryConfig,
    schemas: SchemaStore,
    registry: RegistryClient,
    publisher: Publisher,
    filter: DeviceFilter,
    devices: BTreeMap<String, LocalDevice>,
}

impl Registrar {
    /// Build every collaborator for a run: compile the schemas, read
    /// the credential and registry config files, build the HTTP
    /// clients, and remove any summary left by a prior run.
    pub fn setup(
        credentials_path: &Path,
        site_dir: &Path,
        schema_dir: &Path,
        filter_pattern: &str,
    ) -> Result<Self, CoreError> {
        let filter = DeviceFilter::new(filter_pattern)?;
        let schemas = SchemaStore::load(schema_dir)?;
        let credentials = Credentials::load(credentials_path)?;
        let site = SitePaths::new(site_dir);
        let config = RegistryConfig::load(&site)?;

        // Stale summary from a prior run; rewritten at the end, and a
        // real write problem resurfaces there.
        let _ = fs::remove_file(site.summary_file());

        let transport = Transport::default();
        let info = RegistryInfo {
            project_id: config.project_id.clone(),
            registry_id: config.registry_id.clone(),
            site_name: config.site_name.clone(),
        };
        let registry =
            RegistryClient::new(config.endpoint.clone(), info, &credentials.token, &transport)?;
        let publisher = Publisher::new(
            config.endpoint.clone(),
            config.topic.clone(),
            &credentials.token,
            &transport,
        )?;
        info!(
            project = %config.project_id,
            registry = %config.registry_id,
            "working with registry"
        );

        Ok(Self {
            site,
            config,
            schemas,
            registry,
            publisher,
            filter,
            devices: BTreeMap::new(),
        })
    }

    pub fn site(&self) -> &SitePaths {
        &self.site
    }

    /// Devices loaded so far; empty before `process_devices`.
    pub fn devices(&self) -> &BTreeMap<String, LocalDevice> {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Load and validate the local declarations, then converge the
    /// registry onto them. Fatal failures come back wrapped with the
    /// processing context.
    pub async fn process_devices(&mut self) -> Result<(), CoreError> {
        self.process_inner()
            .await
            .map_err(|err| CoreError::context("While processing devices", err))
    }

    async fn process_inner(&mut self) -> Result<(), CoreError> {
        self.devices = load_local_devices(
            &self.site,
            &self.schemas,
            &self.filter,
            &self.config.registry_id,
            &self.config.project_id,
        )?;
        reconcile(
            &self.registry,
            &self.publisher,
            &self.filter,
            &mut self.devices,
        )
        .await
    }

    /// Category summary over the current ledger state. Usable on the
    /// failure path too, where it backs the diagnostic counts.
    pub fn summary(&self) -> Summary {
        ledger::build_summary(
            self.devices
                .iter()
                .map(|(name, device)| (name.as_str(), device.errors())),
        )
    }

    /// Write each device's errors.json artifact.
    pub fn write_device_errors(&self) -> Result<(), CoreError> {
        for (name, device) in &self.devices {
            ledger::write_device_errors(device.dir(), device.errors())
                .map_err(|err| CoreError::context(format!("While writing errors for {name}"), err))?;
        }
        Ok(())
    }

    /// Write the run summary artifact.
    pub fn write_summary(&self, summary: &Summary) -> Result<(), CoreError> {
        ledger::write_summary(&self.site.summary_file(), summary)
    }

    /// Release the publishing client. Called exactly once at the end
    /// of a run, success or failure.
    pub fn shutdown(&self) -> Result<(), CoreError> {
        self.publisher.shutdown().map_err(CoreError::from)
    }
}
