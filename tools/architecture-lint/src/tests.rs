//! Unit tests for boundary placement and rule checks.

use std::path::{Path, PathBuf};

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Result<(), ArchitectureLintError> {
    lint_sources(&[LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    }])
}

fn messages(result: Result<(), ArchitectureLintError>) -> Vec<String> {
    match result {
        Err(ArchitectureLintError::Violations(found)) => {
            found.into_iter().map(|violation| violation.message).collect()
        }
        other => panic!("expected violations, got {other:?}"),
    }
}

#[rstest]
#[case("domain/binding.rs", Some(Boundary::Domain))]
#[case("domain/monitor/task.rs", Some(Boundary::Domain))]
#[case("inbound/http/bindings.rs", Some(Boundary::Http))]
#[case("inbound/ws/session.rs", Some(Boundary::WebSocket))]
#[case("inbound/mod.rs", Some(Boundary::InboundRoot))]
#[case("outbound/mod.rs", Some(Boundary::OutboundShared))]
#[case("outbound/http_support.rs", Some(Boundary::OutboundShared))]
#[case("outbound/moonraker/http_source.rs", Some(Boundary::Adapter("moonraker".to_owned())))]
#[case("outbound/persistence/pool.rs", Some(Boundary::Adapter("persistence".to_owned())))]
#[case("server/mod.rs", None)]
fn files_map_to_boundaries(#[case] file: &str, #[case] expected: Option<Boundary>) {
    assert_eq!(Boundary::from_path(Path::new(file)), expected);
}

#[rstest]
#[case::domain_uses_ports(
    "domain/monitor/task.rs",
    "use tokio::sync::watch; use crate::domain::ports::DeviceStatusSource; fn run() {}"
)]
#[case::http_uses_domain(
    "inbound/http/bindings.rs",
    "use crate::domain::SpoolId; fn handler() { let _ = SpoolId::new(1); }"
)]
#[case::ws_reuses_http_dto(
    "inbound/ws/messages.rs",
    "use crate::inbound::http::dto::BindingBody; fn f(_: BindingBody) {}"
)]
#[case::adapter_uses_shared_helpers(
    "outbound/spoolman/http_client.rs",
    "use reqwest::Client; use crate::outbound::http_support::status_message; fn f(_: Client) {}"
)]
#[case::adapter_uses_own_module(
    "outbound/persistence/diesel_binding_store.rs",
    "use diesel::prelude::*; use crate::outbound::persistence::DbPool; fn f(_: DbPool) {}"
)]
#[case::relative_paths_are_local(
    "outbound/moonraker/http_source.rs",
    "use super::dto::QueryResponseDto; fn f(_: QueryResponseDto) {}"
)]
#[case::metrics_adapter_uses_prometheus(
    "outbound/metrics/prometheus_reconciliation.rs",
    "use prometheus::IntCounterVec; fn f(_: IntCounterVec) {}"
)]
fn allowed_dependencies_pass(#[case] file: &str, #[case] contents: &str) {
    assert!(lint_one(file, contents).is_ok());
}

#[rstest]
#[case(
    "domain/binding.rs",
    "use crate::inbound::http; fn f() {}",
    "domain module must not depend on crate::inbound::http"
)]
#[case(
    "domain/reconciler.rs",
    "fn count() { let _ = prometheus::Registry::new(); }",
    "domain module must not depend on external crate `prometheus`"
)]
#[case(
    "domain/device.rs",
    "use utoipa::ToSchema; #[derive(ToSchema)] struct Foo;",
    "domain module must not depend on external crate `utoipa`"
)]
#[case(
    "inbound/http/bindings.rs",
    "use spoolkeeper::outbound::persistence::DieselBindingStore; fn f() {}",
    "inbound http module must not depend on crate::outbound::persistence"
)]
#[case(
    "inbound/http/status.rs",
    "use crate::inbound::ws::state::WsState; fn f(_: WsState) {}",
    "inbound http module must not depend on crate::inbound::ws"
)]
#[case(
    "inbound/ws/session.rs",
    "fn client() { let _ = reqwest::Client::new(); }",
    "inbound ws module must not depend on external crate `reqwest`"
)]
#[case(
    "outbound/moonraker/http_source.rs",
    "use crate::outbound::spoolman::SpoolmanInventory; fn f(_: SpoolmanInventory) {}",
    "outbound moonraker module must not depend on crate::outbound::spoolman"
)]
#[case(
    "outbound/spoolman/http_client.rs",
    "use diesel::prelude::*; fn f() {}",
    "outbound spoolman module must not depend on external crate `diesel`"
)]
#[case(
    "outbound/persistence/pool.rs",
    "fn f() { let _ = reqwest::Client::new(); }",
    "outbound persistence module must not depend on external crate `reqwest`"
)]
#[case(
    "outbound/metrics/mod.rs",
    "use inbound::http; fn f() {}",
    "outbound metrics module must not depend on crate::inbound::http"
)]
fn forbidden_dependencies_are_reported(
    #[case] file: &str,
    #[case] contents: &str,
    #[case] expected: &str,
) {
    assert_eq!(messages(lint_one(file, contents)), vec![expected.to_owned()]);
}

#[rstest]
fn repeated_uses_collapse_to_one_violation() {
    let found = messages(lint_one(
        "domain/usage.rs",
        "use awc::Client; fn f(_: awc::Client) { let _ = awc::Client::default(); }",
    ));
    assert_eq!(
        found,
        vec!["domain module must not depend on external crate `awc`".to_owned()]
    );
}

#[rstest]
fn files_outside_the_layers_are_rejected() {
    let result = lint_one("server/mod.rs", "fn main() {}");
    assert!(matches!(result, Err(ArchitectureLintError::Parse { .. })));
}
