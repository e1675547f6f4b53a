//! Translation of driven-port failures into domain errors.
//!
//! Connection-level failures become `service_unavailable` so clients may
//! retry; query failures are `internal` and redacted by the HTTP adapter.

use serde_json::json;

use super::ports::{
    BindingStoreError, DeviceRepositoryError, InventoryServiceError,
    ReconciliationErrorRepositoryError, UsageLedgerError,
};
use super::{DeviceId, Error, SpoolId, ToolheadIndex};

/// Conflict naming the binding that currently holds `spool_id`.
pub(crate) fn binding_conflict(
    device_id: &DeviceId,
    toolhead: ToolheadIndex,
    spool_id: SpoolId,
) -> Error {
    Error::conflict(format!(
        "spool {spool_id} is already bound to {device_id} toolhead {toolhead}"
    ))
    .with_details(json!({
        "deviceId": device_id,
        "toolhead": toolhead.value(),
        "spoolId": spool_id.value(),
        "code": "spool_already_bound",
    }))
}

pub(crate) fn map_binding_error(error: BindingStoreError) -> Error {
    match error {
        BindingStoreError::Connection { message } => {
            Error::service_unavailable(format!("binding store unavailable: {message}"))
        }
        BindingStoreError::Query { message } => {
            Error::internal(format!("binding store error: {message}"))
        }
        BindingStoreError::Conflict {
            device_id,
            toolhead,
            spool_id,
        } => binding_conflict(&device_id, toolhead, spool_id),
        BindingStoreError::UnknownDevice { device_id } => {
            Error::not_found(format!("device {device_id} not found"))
        }
    }
}

pub(crate) fn map_device_error(error: DeviceRepositoryError) -> Error {
    match error {
        DeviceRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("device repository unavailable: {message}"))
        }
        DeviceRepositoryError::Query { message } => {
            Error::internal(format!("device repository error: {message}"))
        }
        DeviceRepositoryError::Duplicate { device_id } => {
            Error::conflict(format!("device {device_id} already exists"))
                .with_details(json!({ "deviceId": device_id, "code": "duplicate_device" }))
        }
        DeviceRepositoryError::InUse { device_id } => {
            Error::conflict(format!("device {device_id} still has bound toolheads"))
                .with_details(json!({ "deviceId": device_id, "code": "device_in_use" }))
        }
    }
}

pub(crate) fn map_ledger_error(error: UsageLedgerError) -> Error {
    match error {
        UsageLedgerError::Connection { message } => {
            Error::service_unavailable(format!("usage ledger unavailable: {message}"))
        }
        UsageLedgerError::Query { message } => {
            Error::internal(format!("usage ledger error: {message}"))
        }
    }
}

pub(crate) fn map_error_log_error(error: ReconciliationErrorRepositoryError) -> Error {
    match error {
        ReconciliationErrorRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("reconciliation error log unavailable: {message}"))
        }
        ReconciliationErrorRepositoryError::Query { message } => {
            Error::internal(format!("reconciliation error log error: {message}"))
        }
    }
}

pub(crate) fn map_inventory_error(error: InventoryServiceError) -> Error {
    match error {
        InventoryServiceError::UnknownSpool { spool_id } => {
            Error::not_found(format!("inventory has no spool {spool_id}"))
        }
        other => Error::service_unavailable(format!("inventory unavailable: {other}")),
    }
}
