//! Driven port for the external filament inventory.
//!
//! Usage is the cumulative mass consumed from a spool in grams. Location is
//! an advisory free-text label mirrored from local bindings.

use async_trait::async_trait;

use crate::domain::SpoolId;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while calling the inventory service.
    pub enum InventoryServiceError {
        /// Network transport failed before a response arrived.
        Transport { message: String } => "inventory transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } => "inventory request timed out: {message}",
        /// The spool does not exist in the inventory.
        UnknownSpool { spool_id: SpoolId } => "inventory has no spool {spool_id}",
        /// The inventory rejected the request.
        Rejected { message: String } => "inventory rejected request: {message}",
        /// The response could not be decoded.
        Decode { message: String } => "inventory response decode failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Current cumulative usage of a spool in grams.
    async fn spool_usage(&self, spool_id: SpoolId) -> Result<f64, InventoryServiceError>;

    /// Overwrite the cumulative usage of a spool.
    async fn set_spool_usage(
        &self,
        spool_id: SpoolId,
        used_grams: f64,
    ) -> Result<(), InventoryServiceError>;

    /// Set the advisory location label of a spool.
    async fn set_spool_location(
        &self,
        spool_id: SpoolId,
        location: &str,
    ) -> Result<(), InventoryServiceError>;

    /// Clear the advisory location label of a spool.
    async fn clear_spool_location(&self, spool_id: SpoolId) -> Result<(), InventoryServiceError>;

    /// Named storage locations known to the inventory.
    async fn list_locations(&self) -> Result<Vec<String>, InventoryServiceError>;
}

/// Fixture inventory where every spool is empty and writes succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureInventoryService;

#[async_trait]
impl InventoryService for FixtureInventoryService {
    async fn spool_usage(&self, _spool_id: SpoolId) -> Result<f64, InventoryServiceError> {
        Ok(0.0)
    }

    async fn set_spool_usage(
        &self,
        _spool_id: SpoolId,
        _used_grams: f64,
    ) -> Result<(), InventoryServiceError> {
        Ok(())
    }

    async fn set_spool_location(
        &self,
        _spool_id: SpoolId,
        _location: &str,
    ) -> Result<(), InventoryServiceError> {
        Ok(())
    }

    async fn clear_spool_location(&self, _spool_id: SpoolId) -> Result<(), InventoryServiceError> {
        Ok(())
    }

    async fn list_locations(&self) -> Result<Vec<String>, InventoryServiceError> {
        Ok(Vec::new())
    }
}
