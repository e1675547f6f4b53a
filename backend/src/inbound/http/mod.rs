//! HTTP inbound adapter exposing REST endpoints.

pub mod bindings;
pub mod devices;
pub mod dto;
pub mod error;
pub mod health;
pub mod pairing;
pub mod reconciliation;
pub mod schemas;
pub mod state;
pub mod status;
#[cfg(test)]
pub mod test_utils;
pub mod validation;

use actix_web::web;

pub use error::ApiResult;

/// Register every `/api/v1` handler together with the extractor
/// configuration that routes body and query decode failures through the
/// shared error envelope.
///
/// Mount it under a scope:
///
/// ```no_run
/// use actix_web::{App, web};
/// use spoolkeeper::inbound::http::configure_api;
///
/// let app = App::new().service(web::scope("/api/v1").configure(configure_api));
/// # let _ = app;
/// ```
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .service(devices::list_devices)
        .service(devices::create_device)
        .service(devices::get_device)
        .service(devices::update_device)
        .service(devices::delete_device)
        .service(devices::retry_completion)
        .service(devices::abandon_completion)
        .service(devices::run_usage_test)
        .service(bindings::list_bindings)
        .service(bindings::assign_spool)
        .service(bindings::unassign_spool)
        .service(pairing::pairing_scan)
        .service(pairing::pairing_session)
        .service(status::get_status)
        .service(status::list_locations)
        .service(reconciliation::list_reconciliation_errors)
        .service(reconciliation::acknowledge_reconciliation_error)
        .service(reconciliation::list_usage_events);
}
