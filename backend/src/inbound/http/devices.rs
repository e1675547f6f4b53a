//! Device registry and monitor control handlers.
//!
//! ```text
//! GET    /api/v1/devices
//! POST   /api/v1/devices
//! GET    /api/v1/devices/{deviceId}
//! PUT    /api/v1/devices/{deviceId}
//! DELETE /api/v1/devices/{deviceId}
//! POST   /api/v1/devices/{deviceId}/monitor/retry
//! POST   /api/v1/devices/{deviceId}/monitor/abandon
//! POST   /api/v1/devices/{deviceId}/usage-test
//! ```

use std::collections::BTreeMap;

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::UsageTestRequest;
use crate::domain::{DeviceDraft, Error, ReconciliationReport, UsageByToolhead};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{DeviceBody, ReconciliationErrorBody, UsageEventBody};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, invalid_usage_error, parse_device_id, parse_toolhead,
};

const DEVICE_ID: FieldName = FieldName::new("deviceId");
const USAGE: FieldName = FieldName::new("usage");

/// Request payload for registering a device.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequestBody {
    #[schema(example = "mk4")]
    pub id: String,
    #[schema(example = "Prusa MK4")]
    pub name: String,
    /// Base URL of the printer API. Omit for a placeholder device.
    #[schema(example = "http://10.0.0.12")]
    pub address: Option<String>,
    /// API key sent to the printer. Write-only.
    pub credential: Option<String>,
    #[schema(example = 1)]
    pub toolhead_count: u16,
}

/// Request payload for replacing a device's settings.
///
/// Omitting `credential` keeps the stored one.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceRequestBody {
    pub name: String,
    pub address: Option<String>,
    pub credential: Option<String>,
    pub toolhead_count: u16,
}

/// Manual usage submission.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageTestRequestBody {
    /// Grams consumed keyed by zero-based toolhead index.
    #[schema(example = json!({"0": 12.5}))]
    pub usage: BTreeMap<String, f64>,
    pub job_label: Option<String>,
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReportBody {
    pub applied: Vec<UsageEventBody>,
    /// Toolheads that reported usage but had no spool bound.
    pub skipped_unbound: Vec<u16>,
    pub failure: Option<ReconciliationErrorBody>,
}

impl From<&ReconciliationReport> for ReconciliationReportBody {
    fn from(report: &ReconciliationReport) -> Self {
        Self {
            applied: report.applied.iter().map(UsageEventBody::from).collect(),
            skipped_unbound: report
                .skipped_unbound
                .iter()
                .map(|toolhead| toolhead.value())
                .collect(),
            failure: report.failure.as_ref().map(ReconciliationErrorBody::from),
        }
    }
}

fn parse_usage(raw: BTreeMap<String, f64>) -> Result<UsageByToolhead, Error> {
    let mut usage = UsageByToolhead::new();
    for (key, grams) in raw {
        let toolhead = parse_toolhead(&key, USAGE)
            .map_err(|_| invalid_usage_error(USAGE, &key, "keys must be toolhead indices"))?;
        if !grams.is_finite() || grams <= 0.0 {
            return Err(invalid_usage_error(USAGE, &key, "grams must be positive"));
        }
        usage.insert(toolhead, grams);
    }
    Ok(usage)
}

/// List registered devices.
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    responses(
        (status = 200, description = "Registered devices", body = [DeviceBody]),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "listDevices"
)]
#[get("/devices")]
pub async fn list_devices(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<DeviceBody>>> {
    let devices = state.devices.list_devices().await?;
    Ok(web::Json(devices.iter().map(DeviceBody::from).collect()))
}

/// Register a device and start monitoring it.
#[utoipa::path(
    post,
    path = "/api/v1/devices",
    request_body = CreateDeviceRequestBody,
    responses(
        (status = 201, description = "Device registered", body = DeviceBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Device id already taken", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "createDevice"
)]
#[post("/devices")]
pub async fn create_device(
    state: web::Data<HttpState>,
    payload: web::Json<CreateDeviceRequestBody>,
) -> ApiResult<HttpResponse> {
    let CreateDeviceRequestBody {
        id,
        name,
        address,
        credential,
        toolhead_count,
    } = payload.into_inner();
    let device = state
        .device_commands
        .create_device(DeviceDraft {
            id,
            name,
            address,
            credential,
            toolhead_count,
        })
        .await?;
    Ok(HttpResponse::Created().json(DeviceBody::from(&device)))
}

/// Fetch one device.
#[utoipa::path(
    get,
    path = "/api/v1/devices/{deviceId}",
    params(("deviceId" = String, Path, description = "Device slug")),
    responses(
        (status = 200, description = "Device", body = DeviceBody),
        (status = 404, description = "Unknown device", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "getDevice"
)]
#[get("/devices/{device_id}")]
pub async fn get_device(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<DeviceBody>> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    let device = state.devices.get_device(&device_id).await?;
    Ok(web::Json(DeviceBody::from(&device)))
}

/// Replace a device's settings and restart its monitor.
#[utoipa::path(
    put,
    path = "/api/v1/devices/{deviceId}",
    params(("deviceId" = String, Path, description = "Device slug")),
    request_body = UpdateDeviceRequestBody,
    responses(
        (status = 200, description = "Device updated", body = DeviceBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 409, description = "A bound toolhead would be removed", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "updateDevice"
)]
#[put("/devices/{device_id}")]
pub async fn update_device(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<UpdateDeviceRequestBody>,
) -> ApiResult<web::Json<DeviceBody>> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    let UpdateDeviceRequestBody {
        name,
        address,
        credential,
        toolhead_count,
    } = payload.into_inner();
    let device = state
        .device_commands
        .update_device(
            &device_id,
            DeviceDraft {
                id: device_id.to_string(),
                name,
                address,
                credential,
                toolhead_count,
            },
        )
        .await?;
    Ok(web::Json(DeviceBody::from(&device)))
}

/// Remove a device and stop its monitor.
#[utoipa::path(
    delete,
    path = "/api/v1/devices/{deviceId}",
    params(("deviceId" = String, Path, description = "Device slug")),
    responses(
        (status = 204, description = "Device removed"),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 409, description = "Device still has bound spools", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "deleteDevice"
)]
#[delete("/devices/{device_id}")]
pub async fn delete_device(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    state.device_commands.delete_device(&device_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Re-run completion handling for a label retained after a failure.
#[utoipa::path(
    post,
    path = "/api/v1/devices/{deviceId}/monitor/retry",
    params(("deviceId" = String, Path, description = "Device slug")),
    responses(
        (status = 202, description = "Retry queued"),
        (status = 404, description = "Device is not monitored", body = ErrorSchema),
        (status = 409, description = "Nothing retained to retry", body = ErrorSchema)
    ),
    tags = ["monitor"],
    operation_id = "retryCompletion"
)]
#[post("/devices/{device_id}/monitor/retry")]
pub async fn retry_completion(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    state.monitor.retry(&device_id).await?;
    Ok(HttpResponse::Accepted().finish())
}

/// Forget a label retained after a failed completion.
#[utoipa::path(
    post,
    path = "/api/v1/devices/{deviceId}/monitor/abandon",
    params(("deviceId" = String, Path, description = "Device slug")),
    responses(
        (status = 202, description = "Abandon queued"),
        (status = 404, description = "Device is not monitored", body = ErrorSchema),
        (status = 409, description = "Nothing retained to abandon", body = ErrorSchema)
    ),
    tags = ["monitor"],
    operation_id = "abandonCompletion"
)]
#[post("/devices/{device_id}/monitor/abandon")]
pub async fn abandon_completion(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    state.monitor.abandon(&device_id).await?;
    Ok(HttpResponse::Accepted().finish())
}

/// Apply usage as if a print had just finished.
#[utoipa::path(
    post,
    path = "/api/v1/devices/{deviceId}/usage-test",
    params(("deviceId" = String, Path, description = "Device slug")),
    request_body = UsageTestRequestBody,
    responses(
        (status = 200, description = "Reconciliation report", body = ReconciliationReportBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema)
    ),
    tags = ["monitor"],
    operation_id = "runUsageTest"
)]
#[post("/devices/{device_id}/usage-test")]
pub async fn run_usage_test(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<UsageTestRequestBody>,
) -> ApiResult<web::Json<ReconciliationReportBody>> {
    let device_id = parse_device_id(&path.into_inner(), DEVICE_ID)?;
    let UsageTestRequestBody { usage, job_label } = payload.into_inner();
    let report = state
        .usage_test
        .run_usage_test(UsageTestRequest {
            device_id,
            usage: parse_usage(usage)?,
            job_label,
        })
        .await?;
    Ok(web::Json(ReconciliationReportBody::from(&report)))
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;
