//! Print completions observed by the monitor flow through to the inventory
//! and the ledgers.

mod support;

use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{Value, json};

use spoolkeeper::domain::ports::MachineSnapshot;
use spoolkeeper::domain::{DeviceId, MachineState};
use support::{FAST_POLL, TestApp, spool};

async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(FAST_POLL).await;
    }
}

fn script_print(app: &TestApp, device: &str, file: &str) {
    app.source.script(
        &DeviceId::new(device).expect("valid id"),
        [
            MachineSnapshot::with_file(MachineState::Printing, file),
            MachineSnapshot::with_file(MachineState::Printing, file),
            MachineSnapshot::bare(MachineState::Finished),
        ],
    );
}

fn networked(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Voron",
        "address": "http://10.0.0.30",
        "toolheadCount": 2
    })
}

#[actix_web::test]
async fn finished_prints_deduct_usage_from_bound_spools() {
    let app = TestApp::new();
    app.source
        .put_file("cube.gcode", "G28\n; filament used [g] = 7.5, 2.0\n");
    script_print(&app, "voron", "cube.gcode");
    let api = app.service().await;

    let placeholder = test::call_service(
        &api,
        test::TestRequest::post()
            .uri("/api/v1/devices")
            .set_json(json!({ "id": "voron", "name": "Voron", "toolheadCount": 2 }))
            .to_request(),
    )
    .await;
    assert_eq!(placeholder.status(), StatusCode::CREATED);
    let bound = test::call_service(
        &api,
        test::TestRequest::put()
            .uri("/api/v1/devices/voron/toolheads/0/binding")
            .set_json(json!({ "spoolId": 2 }))
            .to_request(),
    )
    .await;
    assert_eq!(bound.status(), StatusCode::OK);

    // Adding an address starts polling.
    let updated = test::call_service(
        &api,
        test::TestRequest::put()
            .uri("/api/v1/devices/voron")
            .set_json(json!({
                "name": "Voron",
                "address": "http://10.0.0.30",
                "toolheadCount": 2
            }))
            .to_request(),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);

    eventually(|| !app.usage.events().is_empty()).await;

    let events = app.usage.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].job_label, "cube.gcode");
    assert_eq!(app.inventory.used_grams(spool(2)), Some(7.5));
    assert!(app.errors.records().is_empty());

    app.monitor.shutdown().await;
}

#[actix_web::test]
async fn failed_downloads_are_recorded_and_the_label_retained() {
    let app = TestApp::new();
    script_print(&app, "bench", "lost.gcode");
    let api = app.service().await;

    let created = test::call_service(
        &api,
        test::TestRequest::post()
            .uri("/api/v1/devices")
            .set_json(networked("bench"))
            .to_request(),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    eventually(|| !app.errors.records().is_empty()).await;
    // Let the task fold the failure into its runtime view.
    tokio::time::sleep(FAST_POLL * 5).await;

    let errors: Value = test::call_and_read_body_json(
        &api,
        test::TestRequest::get()
            .uri("/api/v1/reconciliation-errors")
            .to_request(),
    )
    .await;
    assert_eq!(errors[0]["kind"], json!("download_failed"));
    assert_eq!(errors[0]["jobLabel"], json!("lost.gcode"));

    let id = errors[0]["id"].as_str().expect("error id").to_owned();
    let acknowledged = test::call_service(
        &api,
        test::TestRequest::post()
            .uri(&format!("/api/v1/reconciliation-errors/{id}/acknowledge"))
            .to_request(),
    )
    .await;
    assert_eq!(acknowledged.status(), StatusCode::NO_CONTENT);

    let open: Value = test::call_and_read_body_json(
        &api,
        test::TestRequest::get()
            .uri("/api/v1/reconciliation-errors")
            .to_request(),
    )
    .await;
    assert_eq!(open, json!([]));

    let status: Value = test::call_and_read_body_json(
        &api,
        test::TestRequest::get().uri("/api/v1/status").to_request(),
    )
    .await;
    assert_eq!(status["devices"][0]["jobLabel"], json!("lost.gcode"));
    assert_eq!(status["devices"][0]["retainedAfterFailure"], json!(true));

    app.monitor.shutdown().await;
}
