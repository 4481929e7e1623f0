// ── Registry reconciler ──
//
// Converges remote registry state onto the loaded device map. Every
// local device gets a create-or-update, a re-fetch for its assigned
// numeric id, and a metadata publish -- failures there are isolated
// under the `Registering` category and the loop continues. Remote
// devices with no local declaration are blocked afterwards, and a
// blocking failure aborts the run. Strictly sequential throughout.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use sitereg_api::{Publisher, RegistryClient};

use crate::device::{LocalDevice, METADATA_SUBFOLDER};
use crate::error::{error_chain, CoreError};
use crate::ledger::Category;
use crate::loader::DeviceFilter;

/// Reconcile the registry with the local device map.
///
/// Postcondition on success: every device without a `Registering`
/// entry carries a numeric id and has a metadata publish behind it,
/// and every extra remote device matching the filter is blocked.
pub async fn reconcile(
    registry: &RegistryClient,
    publisher: &Publisher,
    filter: &DeviceFilter,
    devices: &mut BTreeMap<String, LocalDevice>,
) -> Result<(), CoreError> {
    info!(registry = registry.registry_id(), "fetching remote registry");
    let remote = registry.list_devices().await?;
    let mut extra: BTreeSet<String> = remote
        .into_iter()
        .map(|device| device.id)
        .filter(|name| filter.matches(name))
        .collect();

    for (name, device) in devices.iter_mut() {
        extra.remove(name);
        if let Err(err) = register_and_publish(registry, publisher, name, device).await {
            let chain = error_chain(&err);
            warn!(device = %name, "deferring exception: {chain}");
            device.record_error(Category::Registering, chain);
        }
    }

    for name in &extra {
        info!(device = %name, "blocking extra device");
        registry
            .block_device(name, true)
            .await
            .map_err(|err| CoreError::context(format!("While blocking {name}"), err.into()))?;
    }
    Ok(())
}

/// One device's register/fetch/publish sequence. Any error is caught
/// by the caller at this per-device granularity.
async fn register_and_publish(
    registry: &RegistryClient,
    publisher: &Publisher,
    name: &str,
    device: &mut LocalDevice,
) -> Result<(), CoreError> {
    if registry.register_device(name, &device.settings()).await? {
        info!(device = %name, "created new device entry");
    } else {
        info!(device = %name, "updated device entry");
    }

    let remote = registry
        .fetch_device(name)
        .await
        .map_err(|err| CoreError::context(format!("Fetching device {name}"), err.into()))?
        .ok_or_else(|| CoreError::MissingDevice(name.to_string()))?;
    let num_id = remote
        .num_id
        .ok_or_else(|| CoreError::MissingNumId(name.to_string()))?;
    device.set_num_id(num_id);

    info!(device = %name, "sending metadata message");
    let attributes = message_attributes(registry, name, num_id);
    publisher.send_message(attributes, device.metadata()).await?;
    Ok(())
}

/// Attributes attached to every metadata message.
fn message_attributes(
    registry: &RegistryClient,
    name: &str,
    num_id: u64,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("deviceId".to_string(), name.to_string()),
        ("deviceNumId".to_string(), num_id.to_string()),
        ("deviceRegistryId".to_string(), registry.registry_id().to_string()),
        ("projectId".to_string(), registry.project_id().to_string()),
        ("subFolder".to_string(), METADATA_SUBFOLDER.to_string()),
    ])
}
