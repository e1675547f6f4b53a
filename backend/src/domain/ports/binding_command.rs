//! Driving ports for toolhead assignment.
//!
//! Both the HTTP binding endpoints and completed pairing sessions go through
//! [`BindingCommand`], so validation, conflict reporting and the inventory
//! mirror behave identically for both.

use async_trait::async_trait;

use crate::domain::{Binding, DeviceId, Error, LocationName, SpoolId, ToolheadIndex};

/// Request to mount a spool on a toolhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignSpoolRequest {
    /// Target device.
    pub device_id: DeviceId,
    /// Target toolhead.
    pub toolhead: ToolheadIndex,
    /// Spool to mount.
    pub spool_id: SpoolId,
}

/// Domain use-case port for mutating bindings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BindingCommand: Send + Sync {
    /// Mount a spool. Fails with `conflict` when the spool is held by a
    /// different toolhead.
    async fn assign(&self, request: AssignSpoolRequest) -> Result<Binding, Error>;

    /// Clear a toolhead, returning the spool it held.
    async fn unassign(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, Error>;

    /// Move a spool off any toolhead and into a named storage location.
    async fn store_at_location(
        &self,
        spool_id: SpoolId,
        location: &LocationName,
    ) -> Result<Option<Binding>, Error>;
}

/// Domain use-case port for reading bindings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BindingQuery: Send + Sync {
    /// Every binding at one point in time.
    async fn list_bindings(&self) -> Result<Vec<Binding>, Error>;
}

/// Fixture binding ports with an always-empty store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBindings;

#[async_trait]
impl BindingCommand for FixtureBindings {
    async fn assign(&self, request: AssignSpoolRequest) -> Result<Binding, Error> {
        Err(Error::not_found(format!(
            "device {} not found",
            request.device_id
        )))
    }

    async fn unassign(
        &self,
        _device_id: &DeviceId,
        _toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, Error> {
        Ok(None)
    }

    async fn store_at_location(
        &self,
        _spool_id: SpoolId,
        _location: &LocationName,
    ) -> Result<Option<Binding>, Error> {
        Ok(None)
    }
}

#[async_trait]
impl BindingQuery for FixtureBindings {
    async fn list_bindings(&self) -> Result<Vec<Binding>, Error> {
        Ok(Vec::new())
    }
}
