//! Merge, completion and expiry behaviour for pairing sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use mockable::Clock;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{MockBindingCommand, MockDeviceQuery, PairingCommand};
use crate::domain::{
    Binding, Device, DeviceDraft, DeviceId, ErrorCode, SpoolId, StatusEvent, ToolheadIndex,
};
use crate::test_support::MutableClock;

const TTL: Duration = Duration::from_secs(300);

#[fixture]
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid time")
}

fn client(raw: &str) -> ClientIdentity {
    ClientIdentity::new(raw).expect("valid identity")
}

fn spool(id: i64) -> SpoolId {
    SpoolId::new(id).expect("valid spool")
}

fn device() -> DeviceId {
    DeviceId::new("voron").expect("valid id")
}

fn toolhead_target() -> PairingTarget {
    PairingTarget::Toolhead {
        device_id: device(),
        toolhead: ToolheadIndex::new(1),
    }
}

fn spool_scan(id: i64) -> PairingScan {
    PairingScan {
        spool_id: Some(spool(id)),
        target: None,
    }
}

fn target_scan(target: PairingTarget) -> PairingScan {
    PairingScan {
        spool_id: None,
        target: Some(target),
    }
}

/// Registry that knows one two-toolhead device.
fn registry() -> MockDeviceQuery {
    let mut devices = MockDeviceQuery::new();
    devices.expect_get_device().returning(|id| {
        if id == &device() {
            Device::new(DeviceDraft {
                id: id.as_str().to_owned(),
                name: "Voron".to_owned(),
                address: None,
                credential: None,
                toolhead_count: 2,
            })
            .map_err(|err| crate::domain::Error::internal(err.to_string()))
        } else {
            Err(crate::domain::Error::not_found(format!("device {id} not found")))
        }
    });
    devices
}

fn service(
    bindings: MockBindingCommand,
    clock: Arc<MutableClock>,
) -> (PairingService, StatusEvents) {
    let events = StatusEvents::default();
    let service = PairingService::new(
        Arc::new(bindings),
        Arc::new(registry()),
        events.clone(),
        clock,
        TTL,
    );
    (service, events)
}

fn bound(spool_id: SpoolId, now: DateTime<Utc>) -> Binding {
    Binding {
        device_id: device(),
        toolhead: ToolheadIndex::new(1),
        spool_id,
        assigned_at: now,
    }
}

#[rstest]
#[tokio::test]
async fn repeated_spool_scan_then_target_completes_once(start: DateTime<Utc>) {
    let mut bindings = MockBindingCommand::new();
    bindings
        .expect_assign()
        .with(eq(AssignSpoolRequest {
            device_id: device(),
            toolhead: ToolheadIndex::new(1),
            spool_id: spool(7),
        }))
        .times(1)
        .returning(move |request| Ok(bound(request.spool_id, start)));
    let clock = Arc::new(MutableClock::new(start));
    let (service, _events) = service(bindings, clock);
    let phone = client("10.0.0.7");

    let first = service.scan(&phone, spool_scan(7)).await.expect("first scan");
    let second = service.scan(&phone, spool_scan(7)).await.expect("second scan");
    assert!(matches!(first, PairingScanOutcome::Pending(_)));
    assert!(matches!(second, PairingScanOutcome::Pending(_)));

    let done = service
        .scan(&phone, target_scan(toolhead_target()))
        .await
        .expect("completing scan");
    assert_eq!(
        done,
        PairingScanOutcome::Completed {
            spool_id: spool(7),
            target: toolhead_target(),
        }
    );
    assert!(service.session(&phone).await.expect("lookup").is_none());
}

#[rstest]
#[tokio::test]
async fn target_first_then_spool_completes(start: DateTime<Utc>) {
    let mut bindings = MockBindingCommand::new();
    bindings
        .expect_assign()
        .times(1)
        .returning(move |request| Ok(bound(request.spool_id, start)));
    let (service, _events) = service(bindings, Arc::new(MutableClock::new(start)));
    let phone = client("10.0.0.7");

    service
        .scan(&phone, target_scan(toolhead_target()))
        .await
        .expect("target scan");
    let done = service.scan(&phone, spool_scan(3)).await.expect("spool scan");
    assert!(matches!(done, PairingScanOutcome::Completed { .. }));
}

#[rstest]
#[tokio::test]
async fn later_spool_scan_replaces_earlier_one(start: DateTime<Utc>) {
    let (service, _events) = service(
        MockBindingCommand::new(),
        Arc::new(MutableClock::new(start)),
    );
    let phone = client("10.0.0.7");

    service.scan(&phone, spool_scan(1)).await.expect("scan");
    service.scan(&phone, spool_scan(2)).await.expect("scan");
    let view = service
        .session(&phone)
        .await
        .expect("lookup")
        .expect("live session");
    assert_eq!(view.spool_id, Some(spool(2)));
    assert_eq!(view.target, None);
}

#[rstest]
#[tokio::test]
async fn expired_session_is_replaced_by_a_fresh_one(start: DateTime<Utc>) {
    let clock = Arc::new(MutableClock::new(start));
    let (service, _events) = service(MockBindingCommand::new(), clock.clone());
    let phone = client("10.0.0.7");

    service.scan(&phone, spool_scan(5)).await.expect("scan");
    clock.advance(TTL);
    assert!(service.session(&phone).await.expect("lookup").is_none());

    let outcome = service
        .scan(&phone, target_scan(toolhead_target()))
        .await
        .expect("scan after expiry");
    let PairingScanOutcome::Pending(view) = outcome else {
        panic!("stale spool half must not complete the session");
    };
    assert_eq!(view.spool_id, None);
    assert_eq!(view.created_at, clock.utc());
}

#[rstest]
#[tokio::test]
async fn ttl_is_fixed_at_creation(start: DateTime<Utc>) {
    let clock = Arc::new(MutableClock::new(start));
    let (service, _events) = service(MockBindingCommand::new(), clock.clone());
    let phone = client("10.0.0.7");

    service.scan(&phone, spool_scan(5)).await.expect("scan");
    clock.advance_seconds(200);
    service.scan(&phone, spool_scan(6)).await.expect("scan");
    let view = service
        .session(&phone)
        .await
        .expect("lookup")
        .expect("live session");
    assert_eq!(view.expires_at, start + chrono::TimeDelta::seconds(300));
}

#[rstest]
#[tokio::test]
async fn sessions_are_isolated_per_client(start: DateTime<Utc>) {
    let (service, _events) = service(
        MockBindingCommand::new(),
        Arc::new(MutableClock::new(start)),
    );

    service
        .scan(&client("10.0.0.7"), spool_scan(5))
        .await
        .expect("scan");
    let other = service
        .scan(&client("10.0.0.8"), target_scan(toolhead_target()))
        .await
        .expect("scan");
    assert!(matches!(other, PairingScanOutcome::Pending(_)));
}

#[rstest]
#[tokio::test]
async fn conflict_is_surfaced_and_session_deleted(start: DateTime<Utc>) {
    let mut bindings = MockBindingCommand::new();
    bindings
        .expect_assign()
        .times(1)
        .returning(|_| Err(crate::domain::Error::conflict("spool 7 is already bound")));
    let (service, events) = service(bindings, Arc::new(MutableClock::new(start)));
    let mut receiver = events.subscribe();
    let phone = client("10.0.0.7");

    service.scan(&phone, spool_scan(7)).await.expect("scan");
    let err = service
        .scan(&phone, target_scan(toolhead_target()))
        .await
        .expect_err("conflict");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert!(service.session(&phone).await.expect("lookup").is_none());

    let mut saw_failure = false;
    while let Ok(event) = receiver.try_recv() {
        saw_failure |= matches!(event, StatusEvent::PairingFailed { .. });
    }
    assert!(saw_failure);
}

#[rstest]
#[tokio::test]
async fn location_target_stores_the_spool(start: DateTime<Utc>) {
    let shelf = LocationName::new("Shelf A").expect("valid location");
    let mut bindings = MockBindingCommand::new();
    bindings
        .expect_store_at_location()
        .with(eq(spool(9)), eq(shelf.clone()))
        .times(1)
        .returning(|_, _| Ok(None));
    let (service, _events) = service(bindings, Arc::new(MutableClock::new(start)));
    let phone = client("10.0.0.7");

    service
        .scan(&phone, target_scan(PairingTarget::Location(shelf.clone())))
        .await
        .expect("scan");
    let done = service.scan(&phone, spool_scan(9)).await.expect("scan");
    assert_eq!(
        done,
        PairingScanOutcome::Completed {
            spool_id: spool(9),
            target: PairingTarget::Location(shelf),
        }
    );
}

#[rstest]
#[tokio::test]
async fn unknown_device_target_is_rejected_without_a_session(start: DateTime<Utc>) {
    let (service, events) = service(
        MockBindingCommand::new(),
        Arc::new(MutableClock::new(start)),
    );
    let mut receiver = events.subscribe();
    let phone = client("10.0.0.7");
    let ghost = PairingTarget::Toolhead {
        device_id: DeviceId::new("ghost").expect("valid id"),
        toolhead: ToolheadIndex::new(0),
    };

    let err = service
        .scan(&phone, target_scan(ghost))
        .await
        .expect_err("unknown device");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(service.session(&phone).await.expect("lookup").is_none());
    assert!(receiver.try_recv().is_err());
}

#[rstest]
#[tokio::test]
async fn out_of_range_toolhead_keeps_the_pending_spool(start: DateTime<Utc>) {
    let (service, _events) = service(
        MockBindingCommand::new(),
        Arc::new(MutableClock::new(start)),
    );
    let phone = client("10.0.0.7");
    service.scan(&phone, spool_scan(7)).await.expect("spool scan");

    let err = service
        .scan(
            &phone,
            target_scan(PairingTarget::Toolhead {
                device_id: device(),
                toolhead: ToolheadIndex::new(5),
            }),
        )
        .await
        .expect_err("toolhead out of range");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(err.message().contains("out of range"));
    let view = service
        .session(&phone)
        .await
        .expect("lookup")
        .expect("spool half survives");
    assert_eq!(view.spool_id, Some(spool(7)));
    assert_eq!(view.target, None);
}

#[rstest]
#[tokio::test]
async fn empty_scan_is_rejected(start: DateTime<Utc>) {
    let (service, _events) = service(
        MockBindingCommand::new(),
        Arc::new(MutableClock::new(start)),
    );
    let err = service
        .scan(&client("10.0.0.7"), PairingScan::default())
        .await
        .expect_err("empty scan");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn sweep_drops_only_expired_sessions(start: DateTime<Utc>) {
    let clock = Arc::new(MutableClock::new(start));
    let (service, _events) = service(MockBindingCommand::new(), clock.clone());

    service
        .scan(&client("10.0.0.7"), spool_scan(1))
        .await
        .expect("scan");
    clock.advance_seconds(200);
    service
        .scan(&client("10.0.0.8"), spool_scan(2))
        .await
        .expect("scan");
    clock.advance_seconds(100);

    assert_eq!(service.sweep_expired().expect("sweep"), 1);
    assert!(
        service
            .session(&client("10.0.0.8"))
            .await
            .expect("lookup")
            .is_some()
    );
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_client_identity_is_rejected(#[case] raw: &str) {
    assert_eq!(
        ClientIdentity::new(raw),
        Err(PairingValidationError::EmptyClientIdentity)
    );
}

#[rstest]
fn session_keys_differ_per_client() {
    assert_ne!(
        SessionKey::derive(&client("10.0.0.7")),
        SessionKey::derive(&client("10.0.0.8"))
    );
}

#[rstest]
#[case("10.0.0.7")]
#[case("fe80::1")]
#[case("a-very-long-forwarded-client-identity-from-a-reverse-proxy")]
fn session_keys_are_a_fixed_hex_prefix(#[case] raw: &str) {
    let key = SessionKey::derive(&client(raw));
    assert_eq!(key.as_str().len(), 16);
    assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(key, SessionKey::derive(&client(raw)));
}
