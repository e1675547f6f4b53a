//! Dashboard snapshot and inventory location listing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::ports::{
    BindingStore, DeviceRepository, DeviceStatus, InventoryService, LocationQuery,
    MonitorControl, StatusQuery, StatusSnapshot,
};
use super::service_errors::{map_binding_error, map_device_error, map_inventory_error};
use super::{DeviceRuntimeView, Error};

/// Service implementing [`StatusQuery`] and [`LocationQuery`].
pub struct StatusService<D, B, I> {
    devices: Arc<D>,
    bindings: Arc<B>,
    inventory: Arc<I>,
    monitor: Arc<dyn MonitorControl>,
}

impl<D, B, I> StatusService<D, B, I> {
    /// Create a service combining persisted and runtime state.
    pub fn new(
        devices: Arc<D>,
        bindings: Arc<B>,
        inventory: Arc<I>,
        monitor: Arc<dyn MonitorControl>,
    ) -> Self {
        Self {
            devices,
            bindings,
            inventory,
            monitor,
        }
    }
}

#[async_trait]
impl<D, B, I> StatusQuery for StatusService<D, B, I>
where
    D: DeviceRepository,
    B: BindingStore,
    I: InventoryService,
{
    async fn status(&self) -> Result<StatusSnapshot, Error> {
        let devices = self.devices.list().await.map_err(map_device_error)?;
        let bindings = self
            .bindings
            .all_bindings()
            .await
            .map_err(map_binding_error)?;
        let mut runtime: HashMap<_, DeviceRuntimeView> = self
            .monitor
            .snapshot()
            .await
            .into_iter()
            .map(|view| (view.device_id.clone(), view))
            .collect();

        let devices = devices
            .into_iter()
            .map(|device| {
                let view = runtime.remove(device.id());
                DeviceStatus {
                    device_id: device.id().clone(),
                    name: device.name().to_owned(),
                    toolhead_count: device.toolhead_count(),
                    state: view
                        .as_ref()
                        .map_or_else(|| device.last_state(), |view| view.state),
                    phase: view.as_ref().map(|view| view.phase),
                    job_label: view.as_ref().and_then(|view| view.job_label.clone()),
                    retained_after_failure: view
                        .as_ref()
                        .is_some_and(|view| view.retained_after_failure),
                }
            })
            .collect();
        Ok(StatusSnapshot { devices, bindings })
    }
}

#[async_trait]
impl<D, B, I> LocationQuery for StatusService<D, B, I>
where
    D: DeviceRepository,
    B: BindingStore,
    I: InventoryService,
{
    async fn list_locations(&self) -> Result<Vec<String>, Error> {
        let mut locations: Vec<String> = self
            .inventory
            .list_locations()
            .await
            .map_err(map_inventory_error)?
            .into_iter()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }
}
