//! Toolhead binding handlers.
//!
//! ```text
//! GET    /api/v1/bindings
//! PUT    /api/v1/devices/{deviceId}/toolheads/{toolhead}/binding
//! DELETE /api/v1/devices/{deviceId}/toolheads/{toolhead}/binding
//! ```

use actix_web::{delete, get, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::AssignSpoolRequest;
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::BindingBody;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_device_id, parse_spool_id, parse_toolhead,
};

/// Spool to mount on the addressed toolhead.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignSpoolRequestBody {
    #[schema(example = 42)]
    pub spool_id: i64,
}

/// Result of clearing a toolhead.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnassignResponseBody {
    /// Spool that was removed, absent when the toolhead was already empty.
    pub released_spool_id: Option<i64>,
}

/// List every toolhead binding.
#[utoipa::path(
    get,
    path = "/api/v1/bindings",
    responses(
        (status = 200, description = "Current bindings", body = [BindingBody]),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["bindings"],
    operation_id = "listBindings"
)]
#[get("/bindings")]
pub async fn list_bindings(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<BindingBody>>> {
    let bindings = state.bindings.list_bindings().await?;
    Ok(web::Json(bindings.iter().map(BindingBody::from).collect()))
}

/// Mount a spool on a toolhead, replacing whatever spool was there.
///
/// A spool already mounted elsewhere is rejected with `409` and the holder's
/// coordinates in `details`.
#[utoipa::path(
    put,
    path = "/api/v1/devices/{deviceId}/toolheads/{toolhead}/binding",
    params(
        ("deviceId" = String, Path, description = "Device slug"),
        ("toolhead" = u16, Path, description = "Zero-based toolhead index")
    ),
    request_body = AssignSpoolRequestBody,
    responses(
        (status = 200, description = "Spool mounted", body = BindingBody),
        (status = 400, description = "Invalid toolhead or spool", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 409, description = "Spool is bound elsewhere", body = ErrorSchema)
    ),
    tags = ["bindings"],
    operation_id = "assignSpool"
)]
#[put("/devices/{device_id}/toolheads/{toolhead}/binding")]
pub async fn assign_spool(
    state: web::Data<HttpState>,
    path: web::Path<(String, String)>,
    payload: web::Json<AssignSpoolRequestBody>,
) -> ApiResult<web::Json<BindingBody>> {
    let (device_id, toolhead) = path.into_inner();
    let request = AssignSpoolRequest {
        device_id: parse_device_id(&device_id, FieldName::new("deviceId"))?,
        toolhead: parse_toolhead(&toolhead, FieldName::new("toolhead"))?,
        spool_id: parse_spool_id(payload.spool_id, FieldName::new("spoolId"))?,
    };
    let binding = state.binding_commands.assign(request).await?;
    Ok(web::Json(BindingBody::from(&binding)))
}

/// Clear a toolhead. Clearing an empty toolhead succeeds.
#[utoipa::path(
    delete,
    path = "/api/v1/devices/{deviceId}/toolheads/{toolhead}/binding",
    params(
        ("deviceId" = String, Path, description = "Device slug"),
        ("toolhead" = u16, Path, description = "Zero-based toolhead index")
    ),
    responses(
        (status = 200, description = "Toolhead cleared", body = UnassignResponseBody),
        (status = 400, description = "Invalid toolhead", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema)
    ),
    tags = ["bindings"],
    operation_id = "unassignSpool"
)]
#[delete("/devices/{device_id}/toolheads/{toolhead}/binding")]
pub async fn unassign_spool(
    state: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> ApiResult<web::Json<UnassignResponseBody>> {
    let (device_id, toolhead) = path.into_inner();
    let device_id = parse_device_id(&device_id, FieldName::new("deviceId"))?;
    let toolhead = parse_toolhead(&toolhead, FieldName::new("toolhead"))?;
    let released = state
        .binding_commands
        .unassign(&device_id, toolhead)
        .await?;
    Ok(web::Json(UnassignResponseBody {
        released_spool_id: released.map(|spool| spool.value()),
    }))
}

#[cfg(test)]
#[path = "bindings_tests.rs"]
mod tests;
