//! Driving ports for dashboard snapshots.

use async_trait::async_trait;

use crate::domain::{Binding, DeviceId, Error, MachineState, MonitorPhase};

/// Per-device row of the status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Device identifier.
    pub device_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Declared toolhead count.
    pub toolhead_count: u16,
    /// Last observed machine state.
    pub state: MachineState,
    /// Monitor phase, absent for placeholder devices.
    pub phase: Option<MonitorPhase>,
    /// Label of the print being tracked or retained.
    pub job_label: Option<String>,
    /// Whether the label was kept after a failed completion.
    pub retained_after_failure: bool,
}

/// Per-device state plus every binding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    /// Devices ordered by identifier.
    pub devices: Vec<DeviceStatus>,
    /// Bindings at the time of the snapshot.
    pub bindings: Vec<Binding>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusQuery: Send + Sync {
    /// Build a dashboard snapshot.
    async fn status(&self) -> Result<StatusSnapshot, Error>;
}

/// Domain use-case port for listing inventory locations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationQuery: Send + Sync {
    /// Named storage locations, sorted and de-duplicated.
    async fn list_locations(&self) -> Result<Vec<String>, Error>;
}

/// Fixture returning empty snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureStatusQuery;

#[async_trait]
impl StatusQuery for FixtureStatusQuery {
    async fn status(&self) -> Result<StatusSnapshot, Error> {
        Ok(StatusSnapshot::default())
    }
}

#[async_trait]
impl LocationQuery for FixtureStatusQuery {
    async fn list_locations(&self) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }
}
