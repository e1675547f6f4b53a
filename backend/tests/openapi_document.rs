//! The published OpenAPI document covers every mounted operation.

use std::collections::BTreeSet;

use rstest::rstest;
use utoipa::OpenApi;

use spoolkeeper::ApiDoc;

#[rstest]
fn operation_ids_are_unique_and_complete() {
    let doc = ApiDoc::openapi();
    let json = serde_json::to_value(&doc).expect("serialise document");
    let paths = json["paths"].as_object().expect("paths object");

    let mut ids = BTreeSet::new();
    let mut count = 0;
    for item in paths.values() {
        for operation in item.as_object().expect("path item").values() {
            if let Some(id) = operation.get("operationId").and_then(|id| id.as_str()) {
                ids.insert(id.to_owned());
                count += 1;
            }
        }
    }

    assert_eq!(ids.len(), count, "duplicate operation ids");
    for expected in [
        "listDevices",
        "createDevice",
        "assignSpool",
        "unassignSpool",
        "pairingScan",
        "getStatus",
        "listUsageEvents",
        "acknowledgeReconciliationError",
        "runUsageTest",
        "statusStream",
    ] {
        assert!(ids.contains(expected), "missing operation {expected}");
    }
}

#[rstest]
fn document_serialises_to_yaml() {
    let yaml = ApiDoc::openapi().to_yaml().expect("yaml document");
    assert!(yaml.contains("Spoolkeeper API"));
}
