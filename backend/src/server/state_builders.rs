//! Wiring of adapters into domain services and adapter state.
//!
//! The services are generic over their storage and inventory adapters, so the
//! same builder assembles the production graph over Diesel and HTTP clients
//! and the test graph over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use url::Url;

use spoolkeeper::domain::ports::{
    BindingStore, DeviceRepository, DeviceStatusSource, InventoryService,
    ReconciliationErrorRepository, ReconciliationMetrics, UsageLedger,
};
use spoolkeeper::domain::{
    BindingService, DeviceMonitor, DeviceMonitorPorts, DeviceService, Error, LedgerService,
    MonitorSettings, PairingService, StatusEvents, StatusService, UsageReconciler,
    UsageReconcilerPorts, UsageTestService,
};
use spoolkeeper::inbound::http::state::{HttpState, HttpStatePorts};
use spoolkeeper::inbound::ws::state::WsState;
use spoolkeeper::outbound::persistence::{
    DbPool, DieselBindingStore, DieselDeviceRepository, DieselReconciliationErrorRepository,
    DieselUsageLedger,
};

/// Adapters backing the domain services.
pub struct Adapters<D, B, I, E, U> {
    pub devices: Arc<D>,
    pub bindings: Arc<B>,
    pub inventory: Arc<I>,
    pub errors: Arc<E>,
    pub usage: Arc<U>,
    pub source: Arc<dyn DeviceStatusSource>,
    pub metrics: Arc<dyn ReconciliationMetrics>,
}

/// PostgreSQL adapter set.
pub type DieselAdapters<I> = Adapters<
    DieselDeviceRepository,
    DieselBindingStore,
    I,
    DieselReconciliationErrorRepository,
    DieselUsageLedger,
>;

/// Attach the Diesel repositories to `pool`.
pub fn diesel_adapters<I>(
    pool: &DbPool,
    inventory: Arc<I>,
    source: Arc<dyn DeviceStatusSource>,
    metrics: Arc<dyn ReconciliationMetrics>,
) -> DieselAdapters<I> {
    Adapters {
        devices: Arc::new(DieselDeviceRepository::new(pool.clone())),
        bindings: Arc::new(DieselBindingStore::new(pool.clone())),
        inventory,
        errors: Arc::new(DieselReconciliationErrorRepository::new(pool.clone())),
        usage: Arc::new(DieselUsageLedger::new(pool.clone())),
        source,
        metrics,
    }
}

/// Service-level settings.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub monitor: MonitorSettings,
    pub pairing_ttl: Duration,
    pub ws_allowed_origins: Vec<Url>,
}

/// The assembled application.
pub struct Services {
    pub http_state: HttpState,
    pub ws_state: WsState,
    pub monitor: Arc<DeviceMonitor>,
    pub pairing: Arc<PairingService>,
    pub device_repository: Arc<dyn DeviceRepository>,
}

impl Services {
    /// Start a monitor task for every persisted device.
    ///
    /// # Errors
    ///
    /// Fails when the device table cannot be read.
    pub async fn start_monitors(&self) -> Result<usize, Error> {
        let devices = self
            .device_repository
            .list()
            .await
            .map_err(|err| Error::service_unavailable(format!("device list failed: {err}")))?;
        let count = devices.len();
        self.monitor.start_all(devices).await?;
        Ok(count)
    }
}

/// Build every domain service over `adapters`.
pub fn build_services<D, B, I, E, U>(
    adapters: Adapters<D, B, I, E, U>,
    settings: ServiceSettings,
    clock: Arc<dyn Clock>,
) -> Services
where
    D: DeviceRepository + 'static,
    B: BindingStore + 'static,
    I: InventoryService + 'static,
    E: ReconciliationErrorRepository + 'static,
    U: UsageLedger + 'static,
{
    let Adapters {
        devices,
        bindings,
        inventory,
        errors,
        usage,
        source,
        metrics,
    } = adapters;
    let events = StatusEvents::default();

    let reconciler = Arc::new(UsageReconciler::new(
        UsageReconcilerPorts {
            bindings: bindings.clone(),
            inventory: inventory.clone(),
            ledger: usage.clone(),
            errors: errors.clone(),
            metrics,
        },
        events.clone(),
        clock.clone(),
    ));
    let monitor = Arc::new(DeviceMonitor::new(
        DeviceMonitorPorts {
            source,
            devices: devices.clone(),
            reconciler: reconciler.clone(),
        },
        events.clone(),
        clock.clone(),
        settings.monitor,
    ));

    let device_service = Arc::new(DeviceService::new(
        devices.clone(),
        bindings.clone(),
        monitor.clone(),
    ));
    let binding_service = Arc::new(BindingService::new(
        devices.clone(),
        bindings.clone(),
        inventory.clone(),
        events.clone(),
        clock.clone(),
    ));
    let status_service = Arc::new(StatusService::new(
        devices.clone(),
        bindings,
        inventory,
        monitor.clone(),
    ));
    let ledger_service = Arc::new(LedgerService::new(errors, usage));
    let usage_test = Arc::new(UsageTestService::new(devices.clone(), reconciler));
    let pairing = Arc::new(PairingService::new(
        binding_service.clone(),
        device_service.clone(),
        events.clone(),
        clock,
        settings.pairing_ttl,
    ));

    let http_state = HttpState::new(HttpStatePorts {
        devices: device_service.clone(),
        device_commands: device_service,
        bindings: binding_service.clone(),
        binding_commands: binding_service,
        status: status_service.clone(),
        locations: status_service,
        ledger: ledger_service.clone(),
        ledger_commands: ledger_service,
        usage_test,
        pairing: pairing.clone(),
        monitor: monitor.clone(),
    });
    let ws_state = WsState::new(events).with_allowed_origins(settings.ws_allowed_origins);

    Services {
        http_state,
        ws_state,
        monitor,
        pairing,
        device_repository: devices,
    }
}
