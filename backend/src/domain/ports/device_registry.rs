//! Driving ports for managing the device registry.
//!
//! Inbound adapters use these ports to read and mutate devices without
//! importing persistence or monitor concerns.

use async_trait::async_trait;

use crate::domain::{Device, DeviceDraft, DeviceId, Error};

/// Domain use-case port for reading devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    /// Every configured device.
    async fn list_devices(&self) -> Result<Vec<Device>, Error>;

    /// One device, or `not_found`.
    async fn get_device(&self, id: &DeviceId) -> Result<Device, Error>;
}

/// Domain use-case port for mutating devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceCommand: Send + Sync {
    /// Register a device and start monitoring it.
    async fn create_device(&self, draft: DeviceDraft) -> Result<Device, Error>;

    /// Replace a device's settings. The identifier in `draft` is ignored.
    async fn update_device(&self, id: &DeviceId, draft: DeviceDraft) -> Result<Device, Error>;

    /// Remove an unbound device and stop monitoring it.
    async fn delete_device(&self, id: &DeviceId) -> Result<(), Error>;
}

/// Fixture registry with no devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceRegistry;

#[async_trait]
impl DeviceQuery for FixtureDeviceRegistry {
    async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        Ok(Vec::new())
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device, Error> {
        Err(Error::not_found(format!("device {id} not found")))
    }
}

#[async_trait]
impl DeviceCommand for FixtureDeviceRegistry {
    async fn create_device(&self, draft: DeviceDraft) -> Result<Device, Error> {
        Device::new(draft).map_err(|err| Error::invalid_request(err.to_string()))
    }

    async fn update_device(&self, id: &DeviceId, _draft: DeviceDraft) -> Result<Device, Error> {
        Err(Error::not_found(format!("device {id} not found")))
    }

    async fn delete_device(&self, id: &DeviceId) -> Result<(), Error> {
        Err(Error::not_found(format!("device {id} not found")))
    }
}
