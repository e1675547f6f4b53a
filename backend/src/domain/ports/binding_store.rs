//! Driven port for the durable toolhead-to-spool relation.
//!
//! Adapters must enforce both keys of the relation: `(device, toolhead)` is
//! the primary key and `spool` is unique across the whole store. The
//! conflict check in [`BindingStore::bind`] and the write that follows form
//! one atomic step; two concurrent binds of the same spool must never both
//! succeed.

use async_trait::async_trait;

use crate::domain::{BindOutcome, Binding, DeviceId, SpoolId, ToolheadIndex};

use super::define_port_error;

define_port_error! {
    /// Errors raised by binding store adapters.
    pub enum BindingStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "binding store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "binding store query failed: {message}",
        /// The spool is mounted on another toolhead.
        Conflict { device_id: DeviceId, toolhead: ToolheadIndex, spool_id: SpoolId } =>
            "spool {spool_id} is already bound to {device_id} toolhead {toolhead}",
        /// The referenced device does not exist.
        UnknownDevice { device_id: DeviceId } => "device {device_id} does not exist",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Mount a spool on a toolhead.
    ///
    /// Fails with [`BindingStoreError::Conflict`] without mutating anything
    /// when the spool is held by a different `(device, toolhead)` pair.
    async fn bind(&self, binding: &Binding) -> Result<BindOutcome, BindingStoreError>;

    /// Clear a toolhead, returning the spool it held. Clearing an empty
    /// toolhead is a no-op.
    async fn unbind(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError>;

    /// Release a spool from whichever toolhead holds it.
    async fn unbind_spool(&self, spool_id: SpoolId) -> Result<Option<Binding>, BindingStoreError>;

    /// Spool mounted on a toolhead.
    async fn lookup(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError>;

    /// Binding holding a spool.
    async fn find_by_spool(&self, spool_id: SpoolId)
    -> Result<Option<Binding>, BindingStoreError>;

    /// Every binding, read at a single point in time.
    async fn all_bindings(&self) -> Result<Vec<Binding>, BindingStoreError>;
}

/// Fixture store that never holds a binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBindingStore;

#[async_trait]
impl BindingStore for FixtureBindingStore {
    async fn bind(&self, _binding: &Binding) -> Result<BindOutcome, BindingStoreError> {
        Ok(BindOutcome::Created)
    }

    async fn unbind(
        &self,
        _device_id: &DeviceId,
        _toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        Ok(None)
    }

    async fn unbind_spool(&self, _spool_id: SpoolId) -> Result<Option<Binding>, BindingStoreError> {
        Ok(None)
    }

    async fn lookup(
        &self,
        _device_id: &DeviceId,
        _toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        Ok(None)
    }

    async fn find_by_spool(
        &self,
        _spool_id: SpoolId,
    ) -> Result<Option<Binding>, BindingStoreError> {
        Ok(None)
    }

    async fn all_bindings(&self) -> Result<Vec<Binding>, BindingStoreError> {
        Ok(Vec::new())
    }
}
