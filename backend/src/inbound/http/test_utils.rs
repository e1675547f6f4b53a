//! Test helpers for inbound HTTP components.

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, test as actix_test, web};
use chrono::{TimeZone, Utc};

use crate::domain::{Binding, Device, DeviceDraft, DeviceId, SpoolId, ToolheadIndex};
use crate::inbound::http::configure_api;
use crate::inbound::http::state::{HttpState, HttpStatePorts};

/// Initialise the `/api/v1` scope against the given ports.
///
/// Unset ports fall back to the fixture implementations.
pub async fn init_api(
    ports: HttpStatePorts,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    actix_test::init_service(
        App::new()
            .app_data(web::Data::new(HttpState::new(ports)))
            .service(web::scope("/api/v1").configure(configure_api)),
    )
    .await
}

pub fn device(id: &str, toolhead_count: u16) -> Device {
    Device::new(DeviceDraft {
        id: id.to_owned(),
        name: format!("Printer {id}"),
        address: Some("http://printer.local".to_owned()),
        credential: None,
        toolhead_count,
    })
    .expect("valid device")
}

pub fn binding(device_id: &str, toolhead: u16, spool_id: i64) -> Binding {
    Binding {
        device_id: DeviceId::new(device_id).expect("valid device id"),
        toolhead: ToolheadIndex::new(toolhead),
        spool_id: SpoolId::new(spool_id).expect("valid spool id"),
        assigned_at: Utc
            .with_ymd_and_hms(2026, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}
