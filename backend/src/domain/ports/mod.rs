//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports describe what the domain needs from storage, printers, the
//! inventory and metrics exporters. Driving ports are the use cases inbound
//! adapters call. Each driven port exposes a typed error enum so adapters map
//! their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod binding_command;
mod binding_store;
mod device_registry;
mod device_repository;
mod device_status_source;
mod inventory_service;
mod monitor_control;
mod pairing_command;
mod reconciliation_error_repository;
mod reconciliation_ledger;
mod reconciliation_metrics;
mod status_query;
mod usage_ledger;

#[cfg(test)]
pub use binding_command::{MockBindingCommand, MockBindingQuery};
pub use binding_command::{AssignSpoolRequest, BindingCommand, BindingQuery, FixtureBindings};
#[cfg(test)]
pub use binding_store::MockBindingStore;
pub use binding_store::{BindingStore, BindingStoreError, FixtureBindingStore};
#[cfg(test)]
pub use device_registry::{MockDeviceCommand, MockDeviceQuery};
pub use device_registry::{DeviceCommand, DeviceQuery, FixtureDeviceRegistry};
#[cfg(test)]
pub use device_repository::MockDeviceRepository;
pub use device_repository::{DeviceRepository, DeviceRepositoryError, FixtureDeviceRepository};
#[cfg(test)]
pub use device_status_source::MockDeviceStatusSource;
pub use device_status_source::{
    DeviceStatusSource, DeviceStatusSourceError, FixtureDeviceStatusSource, MachineSnapshot,
};
#[cfg(test)]
pub use inventory_service::MockInventoryService;
pub use inventory_service::{FixtureInventoryService, InventoryService, InventoryServiceError};
#[cfg(test)]
pub use monitor_control::MockMonitorControl;
pub use monitor_control::{FixtureMonitorControl, MonitorControl};
#[cfg(test)]
pub use pairing_command::MockPairingCommand;
pub use pairing_command::{FixturePairingCommand, PairingCommand};
#[cfg(test)]
pub use reconciliation_error_repository::MockReconciliationErrorRepository;
pub use reconciliation_error_repository::{
    FixtureReconciliationErrorRepository, ReconciliationErrorRepository,
    ReconciliationErrorRepositoryError,
};
#[cfg(test)]
pub use reconciliation_ledger::{MockLedgerCommand, MockLedgerQuery, MockUsageTestCommand};
pub use reconciliation_ledger::{
    FixtureLedger, LedgerCommand, LedgerQuery, UsageTestCommand, UsageTestRequest,
};
#[cfg(test)]
pub use reconciliation_metrics::MockReconciliationMetrics;
pub use reconciliation_metrics::{
    NoOpReconciliationMetrics, ReconciliationMetrics, ReconciliationMetricsError,
    ReconciliationOutcome,
};
#[cfg(test)]
pub use status_query::{MockLocationQuery, MockStatusQuery};
pub use status_query::{
    DeviceStatus, FixtureStatusQuery, LocationQuery, StatusQuery, StatusSnapshot,
};
#[cfg(test)]
pub use usage_ledger::MockUsageLedger;
pub use usage_ledger::{FixtureUsageLedger, UsageLedger, UsageLedgerError};
