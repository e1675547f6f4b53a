//! Shared wiring for integration tests.
//!
//! Integration tests compile as separate crates, so the full service graph
//! over in-memory adapters lives here instead of being repeated per file.

use std::sync::Arc;
use std::time::Duration;

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, test, web};
use chrono::{TimeZone, Utc};

use spoolkeeper::Trace;
use spoolkeeper::domain::ports::NoOpReconciliationMetrics;
use spoolkeeper::domain::{
    BindingService, DeviceMonitor, DeviceMonitorPorts, DeviceService, DownloadPolicy,
    LedgerService, MonitorSettings, PairingService, SpoolId, StatusEvents, StatusService,
    UsageReconciler, UsageReconcilerPorts, UsageTestService,
};
use spoolkeeper::inbound::http::configure_api;
use spoolkeeper::inbound::http::state::{HttpState, HttpStatePorts};
use spoolkeeper::test_support::{
    InMemoryBindingStore, InMemoryDeviceRepository, InMemoryInventory,
    InMemoryReconciliationErrors, InMemoryUsageLedger, MutableClock, ScriptedStatusSource,
};

/// Poll tick used by monitor-driven tests.
pub const FAST_POLL: Duration = Duration::from_millis(10);

/// Every adapter and service of one in-memory deployment.
pub struct TestApp {
    pub http_state: HttpState,
    pub events: StatusEvents,
    pub monitor: Arc<DeviceMonitor>,
    pub inventory: Arc<InMemoryInventory>,
    pub source: Arc<ScriptedStatusSource>,
    pub usage: Arc<InMemoryUsageLedger>,
    pub errors: Arc<InMemoryReconciliationErrors>,
    pub bindings: Arc<InMemoryBindingStore>,
}

/// Spool id shorthand.
pub fn spool(id: i64) -> SpoolId {
    SpoolId::new(id).expect("valid spool id")
}

impl TestApp {
    /// Build the graph with spools 1 to 3 in the inventory.
    pub fn new() -> Self {
        let inventory = Arc::new(
            InMemoryInventory::new()
                .with_spool(spool(1), 100.0)
                .with_spool(spool(2), 0.0)
                .with_spool(spool(3), 0.0)
                .with_location("Shelf A"),
        );
        let devices = Arc::new(InMemoryDeviceRepository::new([]));
        let bindings = Arc::new(InMemoryBindingStore::new([]));
        let usage = Arc::new(InMemoryUsageLedger::new());
        let errors = Arc::new(InMemoryReconciliationErrors::new());
        let source = Arc::new(ScriptedStatusSource::new());
        let clock = Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let events = StatusEvents::default();

        let reconciler = Arc::new(UsageReconciler::new(
            UsageReconcilerPorts {
                bindings: bindings.clone(),
                inventory: inventory.clone(),
                ledger: usage.clone(),
                errors: errors.clone(),
                metrics: Arc::new(NoOpReconciliationMetrics),
            },
            events.clone(),
            clock.clone(),
        ));
        let monitor = Arc::new(DeviceMonitor::new(
            DeviceMonitorPorts {
                source: source.clone(),
                devices: devices.clone(),
                reconciler: reconciler.clone(),
            },
            events.clone(),
            clock.clone(),
            MonitorSettings {
                poll_interval: FAST_POLL,
                status_timeout: Duration::from_secs(1),
                download: DownloadPolicy {
                    max_attempts: 1,
                    initial_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(1),
                    overall_timeout: Duration::from_secs(1),
                },
            },
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
            bindings.clone(),
            inventory.clone(),
            monitor.clone(),
        ));
        let ledger_service = Arc::new(LedgerService::new(errors.clone(), usage.clone()));
        let pairing = Arc::new(PairingService::new(
            binding_service.clone(),
            device_service.clone(),
            events.clone(),
            clock,
            Duration::from_secs(300),
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
            usage_test: Arc::new(UsageTestService::new(devices, reconciler)),
            pairing,
            monitor: monitor.clone(),
        });

        Self {
            http_state,
            events,
            monitor,
            inventory,
            source,
            usage,
            errors,
            bindings,
        }
    }

    /// Initialise the API the way the server mounts it.
    pub async fn service(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
        test::init_service(
            App::new()
                .app_data(web::Data::new(self.http_state.clone()))
                .wrap(Trace)
                .service(web::scope("/api/v1").configure(configure_api)),
        )
        .await
    }
}
