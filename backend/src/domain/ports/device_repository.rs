//! Driven port for device persistence.

use async_trait::async_trait;

use crate::domain::{Device, DeviceId, MachineState};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by device repository adapters.
    pub enum DeviceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "device repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "device repository query failed: {message}",
        /// A device with the same identifier already exists.
        Duplicate { device_id: DeviceId } => "device {device_id} already exists",
        /// The device is still referenced by a binding.
        InUse { device_id: DeviceId } => "device {device_id} still has bound toolheads",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// List every configured device ordered by identifier.
    async fn list(&self) -> Result<Vec<Device>, DeviceRepositoryError>;

    /// Fetch one device.
    async fn find(&self, id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError>;

    /// Insert a new device.
    async fn insert(&self, device: &Device) -> Result<(), DeviceRepositoryError>;

    /// Replace an existing device. Returns `false` when it does not exist.
    async fn update(&self, device: &Device) -> Result<bool, DeviceRepositoryError>;

    /// Delete a device. Returns `false` when it does not exist.
    async fn delete(&self, id: &DeviceId) -> Result<bool, DeviceRepositoryError>;

    /// Persist the last observed machine state.
    async fn record_machine_state(
        &self,
        id: &DeviceId,
        state: MachineState,
    ) -> Result<(), DeviceRepositoryError>;
}

/// Fixture repository with no devices that accepts every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceRepository;

#[async_trait]
impl DeviceRepository for FixtureDeviceRepository {
    async fn list(&self) -> Result<Vec<Device>, DeviceRepositoryError> {
        Ok(Vec::new())
    }

    async fn find(&self, _id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError> {
        Ok(None)
    }

    async fn insert(&self, _device: &Device) -> Result<(), DeviceRepositoryError> {
        Ok(())
    }

    async fn update(&self, _device: &Device) -> Result<bool, DeviceRepositoryError> {
        Ok(false)
    }

    async fn delete(&self, _id: &DeviceId) -> Result<bool, DeviceRepositoryError> {
        Ok(false)
    }

    async fn record_machine_state(
        &self,
        _id: &DeviceId,
        _state: MachineState,
    ) -> Result<(), DeviceRepositoryError> {
        Ok(())
    }
}
