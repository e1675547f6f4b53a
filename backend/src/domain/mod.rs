//! Domain primitives, services and ports.
//!
//! Purpose: hold the filament-tracking core independent of HTTP, Diesel and
//! the printer or inventory wire formats. Inbound adapters call the driving
//! ports in [`ports`]; outbound adapters implement the driven ports.
//!
//! Public surface:
//! - Error (alias to `error::Error`): transport agnostic failure payload.
//! - Device, Binding, UsageEvent, ReconciliationError: persisted entities.
//! - DeviceMonitor, PairingService, UsageReconciler: long-lived services.
//! - BindingService, DeviceService, LedgerService, StatusService,
//!   UsageTestService: driving port implementations.

pub mod binding;
mod binding_service;
pub mod device;
mod device_service;
pub mod error;
mod ledger_service;
pub mod monitor;
pub mod pairing;
pub mod ports;
mod reconciler;
pub mod reconciliation_error;
mod service_errors;
mod status_events;
mod status_service;
pub mod trace_id;
pub mod usage;
mod usage_test_service;

pub use self::binding::{BindOutcome, Binding, SpoolId, SpoolIdError};
pub use self::binding_service::BindingService;
pub use self::device::{
    Device, DeviceCredential, DeviceDraft, DeviceId, DeviceValidationError, MAX_TOOLHEADS,
    MachineState, ToolheadIndex, UnknownMachineState,
};
pub use self::device_service::DeviceService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ledger_service::LedgerService;
pub use self::monitor::{
    AttemptJitter, BackoffJitter, DeviceMonitor, DeviceMonitorPorts, DeviceRuntimeView,
    DeviceTracker, DownloadPolicy, DownloadRuntime, DownloadSleeper, MonitorPhase,
    MonitorSettings, TokioSleeper, TrackerCommandError, TrackerEvent,
};
pub use self::pairing::{
    ClientIdentity, LocationName, PairingScan, PairingScanOutcome, PairingService,
    PairingSession, PairingSessionView, PairingTarget, PairingValidationError, SessionKey,
};
pub use self::reconciler::{ReconciliationReport, UsageReconciler, UsageReconcilerPorts};
pub use self::reconciliation_error::{
    ReconciliationError, ReconciliationErrorId, ReconciliationErrorKind,
};
pub use self::status_events::{StatusEvent, StatusEvents};
pub use self::status_service::StatusService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::usage::{
    DEFAULT_USAGE_LIMIT, MAX_USAGE_LIMIT, USAGE_MARKER, UsageByToolhead, UsageEvent,
    UsageEventFilter, extract_usage,
};
pub use self::usage_test_service::{MANUAL_JOB_LABEL, UsageTestService};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use spoolkeeper::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::not_found("no such device"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
