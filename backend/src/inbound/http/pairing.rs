//! Two-scan pairing handlers.
//!
//! ```text
//! POST /api/v1/pairing/scan
//! GET  /api/v1/pairing/session
//! ```
//!
//! The scanning client is identified by its remote address, so two scans
//! from the same handheld land in the same session.

use actix_web::{HttpRequest, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    ClientIdentity, Error, PairingScan, PairingScanOutcome, PairingTarget, ToolheadIndex,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{PairingSessionBody, PairingTargetBody};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_device_id, parse_location, parse_spool_id,
};

/// One scanned tag. Either half may be absent.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairingScanRequestBody {
    #[schema(example = 42)]
    pub spool_id: Option<i64>,
    pub target: Option<PairingTargetBody>,
}

/// Result of a scan.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PairingScanResponseBody {
    /// The other half has not been scanned yet.
    #[serde(rename_all = "camelCase")]
    Pending { session: PairingSessionBody },
    /// Both halves matched and the spool was moved.
    #[serde(rename_all = "camelCase")]
    Completed {
        spool_id: i64,
        target: PairingTargetBody,
    },
}

/// The caller's live session, if any.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairingSessionStatusBody {
    pub session: Option<PairingSessionBody>,
}

fn client_identity(req: &HttpRequest) -> Result<ClientIdentity, Error> {
    let info = req.connection_info();
    let address = info
        .realip_remote_addr()
        .ok_or_else(|| Error::invalid_request("client address is unknown"))?;
    ClientIdentity::new(address).map_err(|err| Error::invalid_request(err.to_string()))
}

fn parse_target(body: PairingTargetBody) -> Result<PairingTarget, Error> {
    match body {
        PairingTargetBody::Toolhead {
            device_id,
            toolhead,
        } => Ok(PairingTarget::Toolhead {
            device_id: parse_device_id(&device_id, FieldName::new("target.deviceId"))?,
            toolhead: ToolheadIndex::new(toolhead),
        }),
        PairingTargetBody::Location { name } => Ok(PairingTarget::Location(parse_location(
            name,
            FieldName::new("target.name"),
        )?)),
    }
}

fn parse_scan(body: PairingScanRequestBody) -> Result<PairingScan, Error> {
    let PairingScanRequestBody { spool_id, target } = body;
    let scan = PairingScan {
        spool_id: spool_id
            .map(|raw| parse_spool_id(raw, FieldName::new("spoolId")))
            .transpose()?,
        target: target.map(parse_target).transpose()?,
    };
    if scan.is_empty() {
        return Err(Error::invalid_request("scan must carry a spool or a target"));
    }
    Ok(scan)
}

/// Record a scanned tag for the calling client.
///
/// When the scan completes a session the spool is mounted on the toolhead or
/// moved to the named location before the response is sent.
#[utoipa::path(
    post,
    path = "/api/v1/pairing/scan",
    request_body = PairingScanRequestBody,
    responses(
        (status = 200, description = "Scan accepted", body = PairingScanResponseBody),
        (status = 400, description = "Invalid scan", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 409, description = "Spool is bound elsewhere", body = ErrorSchema)
    ),
    tags = ["pairing"],
    operation_id = "pairingScan"
)]
#[post("/pairing/scan")]
pub async fn pairing_scan(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<PairingScanRequestBody>,
) -> ApiResult<web::Json<PairingScanResponseBody>> {
    let client = client_identity(&req)?;
    let scan = parse_scan(payload.into_inner())?;
    let outcome = state.pairing.scan(&client, scan).await?;
    let body = match outcome {
        PairingScanOutcome::Pending(view) => PairingScanResponseBody::Pending {
            session: PairingSessionBody::from(&view),
        },
        PairingScanOutcome::Completed { spool_id, target } => PairingScanResponseBody::Completed {
            spool_id: spool_id.value(),
            target: PairingTargetBody::from(&target),
        },
    };
    Ok(web::Json(body))
}

/// Show the caller's half-complete session.
#[utoipa::path(
    get,
    path = "/api/v1/pairing/session",
    responses(
        (status = 200, description = "Session status", body = PairingSessionStatusBody)
    ),
    tags = ["pairing"],
    operation_id = "pairingSession"
)]
#[get("/pairing/session")]
pub async fn pairing_session(
    state: web::Data<HttpState>,
    req: HttpRequest,
) -> ApiResult<web::Json<PairingSessionStatusBody>> {
    let client = client_identity(&req)?;
    let view = state.pairing.session(&client).await?;
    Ok(web::Json(PairingSessionStatusBody {
        session: view.as_ref().map(PairingSessionBody::from),
    }))
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
