//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    BindingCommand, BindingQuery, DeviceCommand, DeviceQuery, FixtureBindings,
    FixtureDeviceRegistry, FixtureLedger, FixtureMonitorControl, FixturePairingCommand,
    FixtureStatusQuery, LedgerCommand, LedgerQuery, LocationQuery, MonitorControl,
    PairingCommand, StatusQuery, UsageTestCommand,
};

/// Parameter object bundling all port implementations for HTTP handlers.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub devices: Arc<dyn DeviceQuery>,
    pub device_commands: Arc<dyn DeviceCommand>,
    pub bindings: Arc<dyn BindingQuery>,
    pub binding_commands: Arc<dyn BindingCommand>,
    pub status: Arc<dyn StatusQuery>,
    pub locations: Arc<dyn LocationQuery>,
    pub ledger: Arc<dyn LedgerQuery>,
    pub ledger_commands: Arc<dyn LedgerCommand>,
    pub usage_test: Arc<dyn UsageTestCommand>,
    pub pairing: Arc<dyn PairingCommand>,
    pub monitor: Arc<dyn MonitorControl>,
}

impl Default for HttpStatePorts {
    fn default() -> Self {
        Self {
            devices: Arc::new(FixtureDeviceRegistry),
            device_commands: Arc::new(FixtureDeviceRegistry),
            bindings: Arc::new(FixtureBindings),
            binding_commands: Arc::new(FixtureBindings),
            status: Arc::new(FixtureStatusQuery),
            locations: Arc::new(FixtureStatusQuery),
            ledger: Arc::new(FixtureLedger),
            ledger_commands: Arc::new(FixtureLedger),
            usage_test: Arc::new(FixtureLedger),
            pairing: Arc::new(FixturePairingCommand),
            monitor: Arc::new(FixtureMonitorControl),
        }
    }
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub devices: Arc<dyn DeviceQuery>,
    pub device_commands: Arc<dyn DeviceCommand>,
    pub bindings: Arc<dyn BindingQuery>,
    pub binding_commands: Arc<dyn BindingCommand>,
    pub status: Arc<dyn StatusQuery>,
    pub locations: Arc<dyn LocationQuery>,
    pub ledger: Arc<dyn LedgerQuery>,
    pub ledger_commands: Arc<dyn LedgerCommand>,
    pub usage_test: Arc<dyn UsageTestCommand>,
    pub pairing: Arc<dyn PairingCommand>,
    pub monitor: Arc<dyn MonitorControl>,
}

impl From<HttpStatePorts> for HttpState {
    fn from(ports: HttpStatePorts) -> Self {
        Self::new(ports)
    }
}

impl HttpState {
    /// Construct state from a ports bundle.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use spoolkeeper::domain::ports::FixtureBindings;
    /// use spoolkeeper::inbound::http::state::{HttpState, HttpStatePorts};
    ///
    /// let state = HttpState::new(HttpStatePorts {
    ///     bindings: Arc::new(FixtureBindings),
    ///     ..HttpStatePorts::default()
    /// });
    /// let _bindings = state.bindings.clone();
    /// ```
    pub fn new(ports: HttpStatePorts) -> Self {
        let HttpStatePorts {
            devices,
            device_commands,
            bindings,
            binding_commands,
            status,
            locations,
            ledger,
            ledger_commands,
            usage_test,
            pairing,
            monitor,
        } = ports;
        Self {
            devices,
            device_commands,
            bindings,
            binding_commands,
            status,
            locations,
            ledger,
            ledger_commands,
            usage_test,
            pairing,
            monitor,
        }
    }
}
