//! Driving port for supervising per-device monitor tasks.

use async_trait::async_trait;

use crate::domain::{Device, DeviceId, DeviceRuntimeView, Error};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MonitorControl: Send + Sync {
    /// Start (or restart with fresh settings) the monitor for a device.
    /// Placeholder devices are registered but never polled.
    async fn start(&self, device: Device) -> Result<(), Error>;

    /// Stop the monitor for a device. Stopping an unknown device is a no-op.
    async fn stop(&self, device_id: &DeviceId) -> Result<(), Error>;

    /// Re-run completion handling for a label retained after a failure.
    async fn retry(&self, device_id: &DeviceId) -> Result<(), Error>;

    /// Drop a label retained after a failure.
    async fn abandon(&self, device_id: &DeviceId) -> Result<(), Error>;

    /// Runtime view of every supervised device.
    async fn snapshot(&self) -> Vec<DeviceRuntimeView>;
}

/// Fixture control that accepts every command and supervises nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureMonitorControl;

#[async_trait]
impl MonitorControl for FixtureMonitorControl {
    async fn start(&self, _device: Device) -> Result<(), Error> {
        Ok(())
    }

    async fn stop(&self, _device_id: &DeviceId) -> Result<(), Error> {
        Ok(())
    }

    async fn retry(&self, _device_id: &DeviceId) -> Result<(), Error> {
        Ok(())
    }

    async fn abandon(&self, _device_id: &DeviceId) -> Result<(), Error> {
        Ok(())
    }

    async fn snapshot(&self) -> Vec<DeviceRuntimeView> {
        Vec::new()
    }
}
