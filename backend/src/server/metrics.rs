//! Prometheus wiring: one registry shared by the request middleware and the
//! reconciliation counters, plus an optional middleware wrapper so the app
//! type stays the same whether or not metrics could be initialised.

use std::sync::Arc;

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;
use prometheus::Registry;
use tracing::warn;

const NAMESPACE: &str = "spoolkeeper";
const ENDPOINT: &str = "/metrics";

/// Build the request middleware over `registry`, serving it at `/metrics`.
///
/// Failures are logged and yield `None` so the service still starts.
pub(crate) fn request_metrics(registry: &Registry) -> Option<PrometheusMetrics> {
    initialize_metrics(|| {
        PrometheusMetricsBuilder::new(NAMESPACE)
            .endpoint(ENDPOINT)
            .registry(registry.clone())
            .build()
    })
}

pub(crate) fn initialize_metrics<F, E>(make: F) -> Option<PrometheusMetrics>
where
    F: FnOnce() -> Result<PrometheusMetrics, E>,
    E: std::fmt::Display,
{
    match make() {
        Ok(metrics) => Some(metrics),
        Err(error) => {
            warn!(%error, "Prometheus request metrics disabled");
            None
        }
    }
}

#[derive(Clone)]
pub(crate) enum MetricsLayer {
    Enabled(Arc<PrometheusMetrics>),
    Disabled,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        match metrics {
            Some(metrics) => Self::Enabled(Arc::new(metrics)),
            None => Self::Disabled,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self.clone() {
            MetricsLayer::Enabled(metrics) => {
                let fut = Compat::new((*metrics).clone()).new_transform(service);
                Box::pin(async move {
                    let svc = fut.await?;
                    Ok(boxed::service(svc))
                })
            }
            MetricsLayer::Disabled => Box::pin(async move {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Ok(boxed::service(svc))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, test, web};
    use prometheus::{CounterVec, Opts};
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn initialisation_errors_disable_metrics() {
        assert!(initialize_metrics(|| -> Result<PrometheusMetrics, &str> { Err("boom") }).is_none());
    }

    #[actix_web::test]
    async fn shared_registry_exposes_domain_counters() {
        let registry = Registry::new();
        let counter = CounterVec::new(Opts::new("reconciliations_total", "test"), &["status"])
            .expect("counter");
        registry
            .register(Box::new(counter.clone()))
            .expect("register");
        counter.with_label_values(&["success"]).inc();

        let layer = MetricsLayer::from_option(request_metrics(&registry));
        let app = test::init_service(
            App::new()
                .wrap(layer)
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri(ENDPOINT).to_request(),
        )
        .await;
        let text = String::from_utf8(body.to_vec()).expect("utf8 body");
        assert!(text.contains("reconciliations_total"));
    }

    #[actix_web::test]
    async fn disabled_layer_passes_requests_through() {
        let app = test::init_service(
            App::new()
                .wrap(MetricsLayer::from_option(None))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(res.status().is_success());
    }
}
