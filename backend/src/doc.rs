//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! document for the REST API. It registers:
//!
//! - **Paths**: all HTTP endpoints from the inbound layer plus the `/ws`
//!   status stream upgrade
//! - **Schemas**: the error envelope wrappers ([`ErrorSchema`],
//!   [`ErrorCodeSchema`]) and the request/response bodies
//!
//! The API is meant for a trusted LAN and declares no security scheme.
//!
//! The generated document is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use utoipa::OpenApi;

use crate::inbound::http::bindings::{AssignSpoolRequestBody, UnassignResponseBody};
use crate::inbound::http::devices::{
    CreateDeviceRequestBody, ReconciliationReportBody, UpdateDeviceRequestBody,
    UsageTestRequestBody,
};
use crate::inbound::http::dto::{
    BindingBody, DeviceBody, DeviceRuntimeBody, DeviceStatusBody, PairingSessionBody,
    PairingTargetBody, ReconciliationErrorBody, StatusBody, UsageEventBody,
};
use crate::inbound::http::pairing::{
    PairingScanRequestBody, PairingScanResponseBody, PairingSessionStatusBody,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spoolkeeper API",
        description = "Toolhead bindings, pairing, filament usage reconciliation and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::devices::list_devices,
        crate::inbound::http::devices::create_device,
        crate::inbound::http::devices::get_device,
        crate::inbound::http::devices::update_device,
        crate::inbound::http::devices::delete_device,
        crate::inbound::http::devices::retry_completion,
        crate::inbound::http::devices::abandon_completion,
        crate::inbound::http::devices::run_usage_test,
        crate::inbound::http::bindings::list_bindings,
        crate::inbound::http::bindings::assign_spool,
        crate::inbound::http::bindings::unassign_spool,
        crate::inbound::http::pairing::pairing_scan,
        crate::inbound::http::pairing::pairing_session,
        crate::inbound::http::status::get_status,
        crate::inbound::http::status::list_locations,
        crate::inbound::http::reconciliation::list_reconciliation_errors,
        crate::inbound::http::reconciliation::acknowledge_reconciliation_error,
        crate::inbound::http::reconciliation::list_usage_events,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
        crate::inbound::ws::ws_entry,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        BindingBody,
        DeviceBody,
        DeviceStatusBody,
        DeviceRuntimeBody,
        StatusBody,
        UsageEventBody,
        ReconciliationErrorBody,
        PairingTargetBody,
        PairingSessionBody,
        CreateDeviceRequestBody,
        UpdateDeviceRequestBody,
        UsageTestRequestBody,
        ReconciliationReportBody,
        AssignSpoolRequestBody,
        UnassignResponseBody,
        PairingScanRequestBody,
        PairingScanResponseBody,
        PairingSessionStatusBody,
    )),
    tags(
        (name = "devices", description = "Printer registry and monitor control"),
        (name = "bindings", description = "Toolhead to spool bindings"),
        (name = "monitor", description = "Completion retry, abandon and manual usage"),
        (name = "pairing", description = "Two-scan pairing sessions"),
        (name = "status", description = "Live status snapshot and stream"),
        (name = "ledger", description = "Usage history and reconciliation errors"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
