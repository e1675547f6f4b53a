//! Tests for the assembled application.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test;
use rstest::{fixture, rstest};
use serde_json::Value;

use async_trait::async_trait;
use spoolkeeper::domain::ports::{BindingQuery, FixtureBindings};
use spoolkeeper::domain::{Binding, Error, StatusEvents, TRACE_ID_HEADER};
use spoolkeeper::inbound::http::state::HttpStatePorts;

use super::*;

struct OfflineBindings;

#[async_trait]
impl BindingQuery for OfflineBindings {
    async fn list_bindings(&self) -> Result<Vec<Binding>, Error> {
        Err(Error::service_unavailable("database offline"))
    }
}

#[fixture]
fn health_state() -> web::Data<HealthState> {
    web::Data::new(HealthState::new())
}

fn deps(health_state: web::Data<HealthState>, ports: HttpStatePorts) -> AppDependencies {
    AppDependencies {
        health_state,
        http_state: web::Data::new(HttpState::new(ports)),
        ws_state: web::Data::new(WsState::new(StatusEvents::default())),
    }
}

#[rstest]
#[actix_web::test]
async fn readiness_follows_health_state(health_state: web::Data<HealthState>) {
    let app = test::init_service(build_app(deps(
        health_state.clone(),
        HttpStatePorts::default(),
    )))
    .await;
    let probe = || test::TestRequest::get().uri("/health/ready").to_request();

    let before = test::call_service(&app, probe()).await;
    assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

    health_state.mark_ready();
    let after = test::call_service(&app, probe()).await;
    assert_eq!(after.status(), StatusCode::OK);

    health_state.mark_unhealthy();
    let liveness = test::call_service(
        &app,
        test::TestRequest::get().uri("/health/live").to_request(),
    )
    .await;
    assert_eq!(liveness.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[rstest]
#[actix_web::test]
async fn api_routes_are_mounted_under_v1_with_trace_ids(health_state: web::Data<HealthState>) {
    let app = test::init_service(build_app(deps(
        health_state,
        HttpStatePorts {
            bindings: Arc::new(FixtureBindings),
            ..HttpStatePorts::default()
        },
    )))
    .await;

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/bindings").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key(TRACE_ID_HEADER));
}

#[rstest]
#[actix_web::test]
async fn domain_errors_carry_the_response_trace_id(health_state: web::Data<HealthState>) {
    let app = test::init_service(build_app(deps(
        health_state,
        HttpStatePorts {
            bindings: Arc::new(OfflineBindings),
            ..HttpStatePorts::default()
        },
    )))
    .await;

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/bindings").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let header = res
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .expect("trace header");
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["traceId"].as_str(), Some(header.as_str()));
    assert_eq!(body["code"], "service_unavailable");
}

#[rstest]
#[actix_web::test]
async fn unknown_routes_are_not_found(health_state: web::Data<HealthState>) {
    let app = test::init_service(build_app(deps(
        health_state,
        HttpStatePorts::default(),
    )))
    .await;

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v2/bindings").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
