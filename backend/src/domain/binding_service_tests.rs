//! Tests for toolhead assignment.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::{DeviceDraft, ErrorCode};
use crate::test_support::{
    InMemoryBindingStore, InMemoryDeviceRepository, InMemoryInventory, MutableClock,
};

type Service = BindingService<InMemoryDeviceRepository, InMemoryBindingStore, InMemoryInventory>;

struct Harness {
    service: Service,
    bindings: Arc<InMemoryBindingStore>,
    inventory: Arc<InMemoryInventory>,
    events: StatusEvents,
    clock: Arc<MutableClock>,
}

fn device(id: &str, toolheads: u16) -> Device {
    Device::new(DeviceDraft {
        id: id.to_owned(),
        name: id.to_uppercase(),
        address: None,
        credential: None,
        toolhead_count: toolheads,
    })
    .expect("valid device")
}

fn id(raw: &str) -> DeviceId {
    DeviceId::new(raw).expect("valid id")
}

fn spool(value: i64) -> SpoolId {
    SpoolId::new(value).expect("valid spool")
}

fn request(device: &str, toolhead: u16, spool_id: i64) -> AssignSpoolRequest {
    AssignSpoolRequest {
        device_id: id(device),
        toolhead: ToolheadIndex::new(toolhead),
        spool_id: spool(spool_id),
    }
}

#[fixture]
fn harness() -> Harness {
    let now = Utc
        .with_ymd_and_hms(2026, 5, 4, 9, 30, 0)
        .single()
        .expect("valid time");
    let clock = Arc::new(MutableClock::new(now));
    let devices = Arc::new(InMemoryDeviceRepository::new([
        device("mk4", 1),
        device("xl", 5),
    ]));
    let bindings = Arc::new(InMemoryBindingStore::default());
    let inventory = Arc::new(
        InMemoryInventory::new()
            .with_spool(spool(1), 0.0)
            .with_spool(spool(2), 0.0)
            .with_spool(spool(3), 0.0),
    );
    let events = StatusEvents::default();
    let service = BindingService::new(
        devices,
        bindings.clone(),
        inventory.clone(),
        events.clone(),
        clock.clone(),
    );
    Harness {
        service,
        bindings,
        inventory,
        events,
        clock,
    }
}

#[rstest]
#[tokio::test]
async fn assign_binds_mirrors_and_broadcasts(harness: Harness) {
    let mut receiver = harness.events.subscribe();

    let binding = harness
        .service
        .assign(request("xl", 2, 1))
        .await
        .expect("assign");

    assert_eq!(harness.bindings.snapshot(), vec![binding.clone()]);
    assert_eq!(harness.inventory.location(spool(1)).as_deref(), Some("XL T2"));
    assert_eq!(
        receiver.try_recv().ok(),
        Some(StatusEvent::BindingChanged(binding))
    );
}

#[rstest]
#[tokio::test]
async fn spool_bound_elsewhere_is_rejected_without_mutation(harness: Harness) {
    harness
        .service
        .assign(request("mk4", 0, 1))
        .await
        .expect("first assign");
    let before = harness.bindings.snapshot();

    let err = harness
        .service
        .assign(request("xl", 0, 1))
        .await
        .expect_err("spool already mounted");

    assert_eq!(err.code(), ErrorCode::Conflict);
    let details = err.details().expect("conflict details");
    assert_eq!(details["deviceId"], "mk4");
    assert_eq!(details["toolhead"], 0);
    assert_eq!(harness.bindings.snapshot(), before);
}

#[rstest]
#[tokio::test]
async fn rebinding_same_pair_is_idempotent(harness: Harness) {
    let first = harness
        .service
        .assign(request("mk4", 0, 1))
        .await
        .expect("assign");
    harness.clock.advance_seconds(60);
    let mut receiver = harness.events.subscribe();

    let again = harness
        .service
        .assign(request("mk4", 0, 1))
        .await
        .expect("idempotent");

    assert_eq!(again, first);
    assert!(receiver.try_recv().is_err());
}

#[rstest]
#[tokio::test]
async fn replacing_a_spool_releases_the_previous_one(harness: Harness) {
    harness
        .service
        .assign(request("mk4", 0, 1))
        .await
        .expect("assign");
    let mut receiver = harness.events.subscribe();

    harness
        .service
        .assign(request("mk4", 0, 2))
        .await
        .expect("replace");

    assert_eq!(harness.inventory.location(spool(1)), None);
    assert_eq!(harness.inventory.location(spool(2)).as_deref(), Some("MK4 T0"));
    assert!(matches!(
        receiver.try_recv(),
        Ok(StatusEvent::BindingRemoved { spool_id, .. }) if spool_id == spool(1)
    ));
}

#[rstest]
#[case::toolhead_out_of_range(request("mk4", 1, 1), ErrorCode::InvalidRequest)]
#[case::unknown_device(request("prusa", 0, 1), ErrorCode::NotFound)]
#[tokio::test]
async fn invalid_targets_are_rejected(
    harness: Harness,
    #[case] input: AssignSpoolRequest,
    #[case] code: ErrorCode,
) {
    let err = harness.service.assign(input).await.expect_err("rejected");
    assert_eq!(err.code(), code);
    assert!(harness.bindings.snapshot().is_empty());
}

#[rstest]
#[tokio::test]
async fn mirror_failure_keeps_the_binding(harness: Harness) {
    harness.inventory.fail_location_writes(true);

    harness
        .service
        .assign(request("xl", 1, 3))
        .await
        .expect("binding survives mirror failure");

    assert_eq!(harness.bindings.snapshot().len(), 1);
}

#[rstest]
#[tokio::test]
async fn unassigning_an_empty_toolhead_is_a_no_op(harness: Harness) {
    let removed = harness
        .service
        .unassign(&id("xl"), ToolheadIndex::new(4))
        .await
        .expect("no-op");
    assert_eq!(removed, None);
}

#[rstest]
#[tokio::test]
async fn unassign_clears_location(harness: Harness) {
    harness
        .service
        .assign(request("xl", 1, 3))
        .await
        .expect("assign");

    let removed = harness
        .service
        .unassign(&id("xl"), ToolheadIndex::new(1))
        .await
        .expect("unassign");

    assert_eq!(removed, Some(spool(3)));
    assert_eq!(harness.inventory.location(spool(3)), None);
}

#[rstest]
#[tokio::test]
async fn storing_a_spool_releases_its_toolhead(harness: Harness) {
    harness
        .service
        .assign(request("xl", 3, 2))
        .await
        .expect("assign");
    let shelf = LocationName::new("Dry box A").expect("valid location");

    let released = harness
        .service
        .store_at_location(spool(2), &shelf)
        .await
        .expect("store");

    assert_eq!(released.map(|b| b.toolhead), Some(ToolheadIndex::new(3)));
    assert!(harness.bindings.snapshot().is_empty());
    assert_eq!(harness.inventory.location(spool(2)).as_deref(), Some("Dry box A"));
}

#[rstest]
#[tokio::test]
async fn uniqueness_holds_across_any_bind_sequence(harness: Harness) {
    let slots = [("mk4", 0), ("xl", 0), ("xl", 1), ("xl", 4)];
    for round in 0..3_i64 {
        for (offset, (device_id, toolhead)) in slots.iter().enumerate() {
            let spool_id = (round + i64::try_from(offset).expect("small")) % 3 + 1;
            if let Err(err) = harness
                .service
                .assign(request(device_id, *toolhead, spool_id))
                .await
            {
                assert_eq!(err.code(), ErrorCode::Conflict);
            }

            let rows = harness.bindings.snapshot();
            let distinct: HashSet<SpoolId> = rows.iter().map(|b| b.spool_id).collect();
            assert_eq!(distinct.len(), rows.len(), "spool bound twice: {rows:?}");
        }
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_of_one_spool_admit_exactly_one(harness: Harness) {
    let slots = [("mk4", 0), ("xl", 0), ("xl", 1), ("xl", 2), ("xl", 3), ("xl", 4)];
    let service = Arc::new(harness.service);
    let tasks: Vec<_> = slots
        .iter()
        .map(|&(device_id, toolhead)| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.assign(request(device_id, toolhead, 1)).await })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("assign task joins") {
            Ok(binding) => {
                winners += 1;
                assert_eq!(binding.spool_id, spool(1));
            }
            Err(err) => assert_eq!(err.code(), ErrorCode::Conflict),
        }
    }

    assert_eq!(winners, 1);
    let rows = harness.bindings.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].spool_id, spool(1));
}

#[rstest]
#[tokio::test]
async fn store_outage_is_service_unavailable(harness: Harness) {
    harness.bindings.set_offline(true);
    let err = harness
        .service
        .list_bindings()
        .await
        .expect_err("offline");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
