//! Reconciliation error ledger and usage history handlers.
//!
//! ```text
//! GET  /api/v1/reconciliation-errors?includeAcknowledged=true
//! POST /api/v1/reconciliation-errors/{id}/acknowledge
//! GET  /api/v1/usage-events?deviceId=mk4&limit=50
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;

use crate::domain::{DEFAULT_USAGE_LIMIT, UsageEventFilter};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{ReconciliationErrorBody, UsageEventBody};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_device_id, parse_error_id};

/// Query parameters for the error ledger.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorListQuery {
    /// Include acknowledged errors. Defaults to `false`.
    #[serde(default)]
    pub include_acknowledged: bool,
}

/// Query parameters for usage history.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEventQuery {
    /// Restrict to one device.
    pub device_id: Option<String>,
    /// Page size; defaults to 50 and is capped at 500.
    pub limit: Option<usize>,
}

/// List reconciliation errors, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/reconciliation-errors",
    params(
        ("includeAcknowledged" = Option<bool>, Query, description = "Include acknowledged errors")
    ),
    responses(
        (status = 200, description = "Reconciliation errors", body = [ReconciliationErrorBody]),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["ledger"],
    operation_id = "listReconciliationErrors"
)]
#[get("/reconciliation-errors")]
pub async fn list_reconciliation_errors(
    state: web::Data<HttpState>,
    query: web::Query<ErrorListQuery>,
) -> ApiResult<web::Json<Vec<ReconciliationErrorBody>>> {
    let errors = state
        .ledger
        .reconciliation_errors(query.include_acknowledged)
        .await?;
    Ok(web::Json(
        errors.iter().map(ReconciliationErrorBody::from).collect(),
    ))
}

/// Mark an error as seen. Acknowledging twice succeeds.
#[utoipa::path(
    post,
    path = "/api/v1/reconciliation-errors/{id}/acknowledge",
    params(("id" = uuid::Uuid, Path, description = "Error identifier")),
    responses(
        (status = 204, description = "Acknowledged"),
        (status = 400, description = "Malformed identifier", body = ErrorSchema),
        (status = 404, description = "Unknown error", body = ErrorSchema)
    ),
    tags = ["ledger"],
    operation_id = "acknowledgeReconciliationError"
)]
#[post("/reconciliation-errors/{id}/acknowledge")]
pub async fn acknowledge_reconciliation_error(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_error_id(&path.into_inner(), FieldName::new("id"))?;
    state.ledger_commands.acknowledge(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// List applied usage, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/usage-events",
    params(
        ("deviceId" = Option<String>, Query, description = "Restrict to one device"),
        ("limit" = Option<usize>, Query, description = "Page size, default 50, max 500")
    ),
    responses(
        (status = 200, description = "Usage events", body = [UsageEventBody]),
        (status = 400, description = "Invalid filter", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["ledger"],
    operation_id = "listUsageEvents"
)]
#[get("/usage-events")]
pub async fn list_usage_events(
    state: web::Data<HttpState>,
    query: web::Query<UsageEventQuery>,
) -> ApiResult<web::Json<Vec<UsageEventBody>>> {
    let UsageEventQuery { device_id, limit } = query.into_inner();
    let filter = UsageEventFilter {
        device_id: device_id
            .as_deref()
            .map(|raw| parse_device_id(raw, FieldName::new("deviceId")))
            .transpose()?,
        limit: limit.unwrap_or(DEFAULT_USAGE_LIMIT),
    };
    let events = state.ledger.usage_events(filter).await?;
    Ok(web::Json(events.iter().map(UsageEventBody::from).collect()))
}

#[cfg(test)]
#[path = "reconciliation_tests.rs"]
mod tests;
