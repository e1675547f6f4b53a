//! Device registry use cases.
//!
//! Every successful mutation is followed by the matching monitor action so
//! the set of polling tasks tracks the registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::ports::{BindingStore, DeviceCommand, DeviceQuery, DeviceRepository, MonitorControl};
use super::service_errors::{map_binding_error, map_device_error};
use super::{Binding, Device, DeviceDraft, DeviceId, Error};

/// Device service implementing [`DeviceQuery`] and [`DeviceCommand`].
pub struct DeviceService<D, B> {
    devices: Arc<D>,
    bindings: Arc<B>,
    monitor: Arc<dyn MonitorControl>,
}

impl<D, B> DeviceService<D, B> {
    /// Create a service over the given adapters.
    pub fn new(devices: Arc<D>, bindings: Arc<B>, monitor: Arc<dyn MonitorControl>) -> Self {
        Self {
            devices,
            bindings,
            monitor,
        }
    }
}

fn not_found(id: &DeviceId) -> Error {
    Error::not_found(format!("device {id} not found"))
}

fn validate(draft: DeviceDraft) -> Result<Device, Error> {
    Device::new(draft).map_err(|err| Error::invalid_request(err.to_string()))
}

impl<D, B> DeviceService<D, B>
where
    D: DeviceRepository,
    B: BindingStore,
{
    async fn bindings_of(&self, id: &DeviceId) -> Result<Vec<Binding>, Error> {
        let all = self
            .bindings
            .all_bindings()
            .await
            .map_err(map_binding_error)?;
        Ok(all
            .into_iter()
            .filter(|binding| &binding.device_id == id)
            .collect())
    }
}

#[async_trait]
impl<D, B> DeviceQuery for DeviceService<D, B>
where
    D: DeviceRepository,
    B: BindingStore,
{
    async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        self.devices.list().await.map_err(map_device_error)
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device, Error> {
        self.devices
            .find(id)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| not_found(id))
    }
}

#[async_trait]
impl<D, B> DeviceCommand for DeviceService<D, B>
where
    D: DeviceRepository,
    B: BindingStore,
{
    async fn create_device(&self, draft: DeviceDraft) -> Result<Device, Error> {
        let device = validate(draft)?;
        self.devices
            .insert(&device)
            .await
            .map_err(map_device_error)?;
        info!(device_id = %device.id(), configured = device.is_configured(), "device created");
        self.monitor.start(device.clone()).await?;
        Ok(device)
    }

    async fn update_device(&self, id: &DeviceId, draft: DeviceDraft) -> Result<Device, Error> {
        let existing = self.get_device(id).await?;
        // Credentials are write-only; an update without one keeps the old one.
        let credential = draft.credential.or_else(|| {
            existing
                .credential()
                .map(|secret| secret.expose().to_owned())
        });
        let device = validate(DeviceDraft {
            id: id.to_string(),
            credential,
            ..draft
        })?
        .with_last_state(existing.last_state());

        let stranded = self
            .bindings_of(id)
            .await?
            .into_iter()
            .find(|binding| device.check_toolhead(binding.toolhead).is_err());
        if let Some(binding) = stranded {
            return Err(Error::conflict(format!(
                "toolhead {} of {id} still holds spool {}",
                binding.toolhead, binding.spool_id
            ))
            .with_details(json!({
                "deviceId": id,
                "toolhead": binding.toolhead.value(),
                "spoolId": binding.spool_id.value(),
                "code": "toolhead_in_use",
            })));
        }

        if !self
            .devices
            .update(&device)
            .await
            .map_err(map_device_error)?
        {
            return Err(not_found(id));
        }
        info!(device_id = %id, "device updated");
        self.monitor.start(device.clone()).await?;
        Ok(device)
    }

    async fn delete_device(&self, id: &DeviceId) -> Result<(), Error> {
        let bound = self.bindings_of(id).await?;
        if !bound.is_empty() {
            return Err(Error::conflict(format!(
                "device {id} still has {} bound toolhead(s)",
                bound.len()
            ))
            .with_details(json!({ "deviceId": id, "code": "device_in_use" })));
        }
        if !self.devices.delete(id).await.map_err(map_device_error)? {
            return Err(not_found(id));
        }
        info!(device_id = %id, "device deleted");
        self.monitor.stop(id).await
    }
}

#[cfg(test)]
#[path = "device_service_tests.rs"]
mod tests;
