//! Status snapshot and inventory location handlers.
//!
//! ```text
//! GET /api/v1/status
//! GET /api/v1/locations
//! ```

use actix_web::{get, web};

use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::StatusBody;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Per-device monitor state together with every binding.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses(
        (status = 200, description = "Status snapshot", body = StatusBody),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["status"],
    operation_id = "getStatus"
)]
#[get("/status")]
pub async fn get_status(state: web::Data<HttpState>) -> ApiResult<web::Json<StatusBody>> {
    let snapshot = state.status.status().await?;
    Ok(web::Json(StatusBody::from(&snapshot)))
}

/// Storage location names known to the inventory, for printing pairing
/// labels.
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    responses(
        (status = 200, description = "Location names", body = [String]),
        (status = 503, description = "Inventory unavailable", body = ErrorSchema)
    ),
    tags = ["status"],
    operation_id = "listLocations"
)]
#[get("/locations")]
pub async fn list_locations(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<String>>> {
    Ok(web::Json(state.locations.list_locations().await?))
}
