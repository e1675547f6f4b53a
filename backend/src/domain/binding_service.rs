//! Toolhead assignment use cases.
//!
//! The binding store owns the uniqueness invariant; this service validates
//! requests against the device registry, mirrors the result to the inventory
//! location field and broadcasts the change. Mirror failures are logged and
//! never undo the local binding.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};

use super::ports::{
    AssignSpoolRequest, BindingCommand, BindingQuery, BindingStore, DeviceRepository,
    InventoryService,
};
use super::service_errors::{map_binding_error, map_device_error};
use super::{
    BindOutcome, Binding, Device, DeviceId, Error, LocationName, SpoolId, StatusEvent,
    StatusEvents, ToolheadIndex,
};

/// Binding service implementing [`BindingCommand`] and [`BindingQuery`].
pub struct BindingService<D, B, I> {
    devices: Arc<D>,
    bindings: Arc<B>,
    inventory: Arc<I>,
    events: StatusEvents,
    clock: Arc<dyn Clock>,
}

impl<D, B, I> BindingService<D, B, I> {
    /// Create a service over the given adapters.
    pub fn new(
        devices: Arc<D>,
        bindings: Arc<B>,
        inventory: Arc<I>,
        events: StatusEvents,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            devices,
            bindings,
            inventory,
            events,
            clock,
        }
    }
}

impl<D, B, I> BindingService<D, B, I>
where
    D: DeviceRepository,
    B: BindingStore,
    I: InventoryService,
{
    async fn device_slot(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Device, Error> {
        let device = self
            .devices
            .find(device_id)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| Error::not_found(format!("device {device_id} not found")))?;
        device
            .check_toolhead(toolhead)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        Ok(device)
    }

    async fn mirror_location(&self, spool_id: SpoolId, location: &str) {
        if let Err(err) = self.inventory.set_spool_location(spool_id, location).await {
            warn!(%spool_id, location, %err, "failed to mirror spool location");
        }
    }

    async fn clear_location(&self, spool_id: SpoolId) {
        if let Err(err) = self.inventory.clear_spool_location(spool_id).await {
            warn!(%spool_id, %err, "failed to clear spool location");
        }
    }

    async fn released(&self, device_id: &DeviceId, toolhead: ToolheadIndex, spool_id: SpoolId) {
        self.clear_location(spool_id).await;
        self.events.publish(StatusEvent::BindingRemoved {
            device_id: device_id.clone(),
            toolhead,
            spool_id,
        });
    }
}

#[async_trait]
impl<D, B, I> BindingCommand for BindingService<D, B, I>
where
    D: DeviceRepository,
    B: BindingStore,
    I: InventoryService,
{
    async fn assign(&self, request: AssignSpoolRequest) -> Result<Binding, Error> {
        let AssignSpoolRequest {
            device_id,
            toolhead,
            spool_id,
        } = request;
        let device = self.device_slot(&device_id, toolhead).await?;
        let binding = Binding {
            device_id,
            toolhead,
            spool_id,
            assigned_at: self.clock.utc(),
        };

        let outcome = self
            .bindings
            .bind(&binding)
            .await
            .map_err(map_binding_error)?;
        match outcome {
            BindOutcome::Unchanged => {
                let stored = self
                    .bindings
                    .find_by_spool(spool_id)
                    .await
                    .map_err(map_binding_error)?;
                return Ok(stored.unwrap_or(binding));
            }
            BindOutcome::Replaced { previous } => {
                info!(device_id = %binding.device_id, %toolhead, %previous, "spool replaced");
                self.released(&binding.device_id, toolhead, previous).await;
            }
            BindOutcome::Created => {}
        }

        info!(device_id = %binding.device_id, %toolhead, %spool_id, "spool assigned");
        self.mirror_location(spool_id, &device.toolhead_location(toolhead))
            .await;
        self.events
            .publish(StatusEvent::BindingChanged(binding.clone()));
        Ok(binding)
    }

    async fn unassign(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, Error> {
        self.device_slot(device_id, toolhead).await?;
        let removed = self
            .bindings
            .unbind(device_id, toolhead)
            .await
            .map_err(map_binding_error)?;
        if let Some(spool_id) = removed {
            info!(%device_id, %toolhead, %spool_id, "spool unassigned");
            self.released(device_id, toolhead, spool_id).await;
        }
        Ok(removed)
    }

    async fn store_at_location(
        &self,
        spool_id: SpoolId,
        location: &LocationName,
    ) -> Result<Option<Binding>, Error> {
        let released = self
            .bindings
            .unbind_spool(spool_id)
            .await
            .map_err(map_binding_error)?;
        if let Some(binding) = &released {
            info!(
                device_id = %binding.device_id,
                toolhead = %binding.toolhead,
                %spool_id,
                "spool released for storage"
            );
            self.events.publish(StatusEvent::BindingRemoved {
                device_id: binding.device_id.clone(),
                toolhead: binding.toolhead,
                spool_id,
            });
        }
        info!(%spool_id, location = location.as_str(), "spool stored");
        self.mirror_location(spool_id, location.as_str()).await;
        Ok(released)
    }
}

#[async_trait]
impl<D, B, I> BindingQuery for BindingService<D, B, I>
where
    D: DeviceRepository,
    B: BindingStore,
    I: InventoryService,
{
    async fn list_bindings(&self) -> Result<Vec<Binding>, Error> {
        self.bindings
            .all_bindings()
            .await
            .map_err(map_binding_error)
    }
}

#[cfg(test)]
#[path = "binding_service_tests.rs"]
mod tests;
