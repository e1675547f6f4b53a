//! Manual usage trigger.
//!
//! Runs the reconciler directly with operator-supplied usage, exercising the
//! same inventory and ledger path a finished print takes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::ports::{DeviceRepository, UsageTestCommand, UsageTestRequest};
use super::service_errors::map_device_error;
use super::{Error, ReconciliationReport, UsageReconciler};

/// Job label recorded when the request carries none.
pub const MANUAL_JOB_LABEL: &str = "manual-usage-test";

/// Service implementing [`UsageTestCommand`].
pub struct UsageTestService<D> {
    devices: Arc<D>,
    reconciler: Arc<UsageReconciler>,
}

impl<D> UsageTestService<D> {
    /// Create a service sharing the monitor's reconciler.
    pub fn new(devices: Arc<D>, reconciler: Arc<UsageReconciler>) -> Self {
        Self {
            devices,
            reconciler,
        }
    }
}

#[async_trait]
impl<D> UsageTestCommand for UsageTestService<D>
where
    D: DeviceRepository,
{
    async fn run_usage_test(
        &self,
        request: UsageTestRequest,
    ) -> Result<ReconciliationReport, Error> {
        let UsageTestRequest {
            device_id,
            usage,
            job_label,
        } = request;
        let device = self
            .devices
            .find(&device_id)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| Error::not_found(format!("device {device_id} not found")))?;
        if usage.is_empty() {
            return Err(Error::invalid_request(
                "usage must contain at least one positive mass",
            ));
        }
        for (toolhead, _) in usage.iter() {
            device
                .check_toolhead(toolhead)
                .map_err(|err| Error::invalid_request(err.to_string()))?;
        }

        let label = job_label
            .map(|label| label.trim().to_owned())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| MANUAL_JOB_LABEL.to_owned());
        info!(%device_id, job_label = %label, toolheads = usage.len(), "manual usage test");
        Ok(self.reconciler.reconcile(&device_id, &usage, &label).await)
    }
}

#[cfg(test)]
mod tests {
    //! Manual trigger validation and ledger effects.

    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::NoOpReconciliationMetrics;
    use crate::domain::{
        Binding, Device, DeviceDraft, DeviceId, ErrorCode, SpoolId, StatusEvents, ToolheadIndex,
        UsageByToolhead, UsageReconcilerPorts,
    };
    use crate::test_support::{
        InMemoryBindingStore, InMemoryDeviceRepository, InMemoryInventory,
        InMemoryReconciliationErrors, InMemoryUsageLedger, MutableClock,
    };

    struct Harness {
        service: UsageTestService<InMemoryDeviceRepository>,
        inventory: Arc<InMemoryInventory>,
        ledger: Arc<InMemoryUsageLedger>,
    }

    fn spool(value: i64) -> SpoolId {
        SpoolId::new(value).expect("valid spool")
    }

    fn harness() -> Harness {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 2, 8, 0, 0)
            .single()
            .expect("valid time");
        let device = Device::new(DeviceDraft {
            id: "mini".to_owned(),
            name: "Prusa Mini".to_owned(),
            address: None,
            credential: None,
            toolhead_count: 2,
        })
        .expect("valid device");
        let bindings = Arc::new(InMemoryBindingStore::new([Binding {
            device_id: device.id().clone(),
            toolhead: ToolheadIndex::new(1),
            spool_id: spool(4),
            assigned_at: now,
        }]));
        let inventory = Arc::new(InMemoryInventory::new().with_spool(spool(4), 10.0));
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let reconciler = Arc::new(UsageReconciler::new(
            UsageReconcilerPorts {
                bindings,
                inventory: inventory.clone(),
                ledger: ledger.clone(),
                errors: Arc::new(InMemoryReconciliationErrors::new()),
                metrics: Arc::new(NoOpReconciliationMetrics),
            },
            StatusEvents::default(),
            Arc::new(MutableClock::new(now)),
        ));
        Harness {
            service: UsageTestService::new(
                Arc::new(InMemoryDeviceRepository::new([device])),
                reconciler,
            ),
            inventory,
            ledger,
        }
    }

    fn request(usage: &[(u16, f64)], job_label: Option<&str>) -> UsageTestRequest {
        UsageTestRequest {
            device_id: DeviceId::new("mini").expect("valid id"),
            usage: usage
                .iter()
                .map(|(toolhead, grams)| (ToolheadIndex::new(*toolhead), *grams))
                .collect::<UsageByToolhead>(),
            job_label: job_label.map(str::to_owned),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn applies_bound_usage_and_skips_unbound() {
        let h = harness();

        let report = h
            .service
            .run_usage_test(request(&[(0, 4.0), (1, 2.5)], None))
            .await
            .expect("ran");

        assert!(report.succeeded());
        assert_eq!(report.skipped_unbound, vec![ToolheadIndex::new(0)]);
        assert_eq!(h.inventory.used_grams(spool(4)), Some(12.5));
        let events = h.ledger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_label, MANUAL_JOB_LABEL);
    }

    #[rstest]
    #[tokio::test]
    async fn unbound_only_usage_touches_nothing() {
        let h = harness();

        let report = h
            .service
            .run_usage_test(request(&[(0, 4.0)], Some("calibration")))
            .await
            .expect("ran");

        assert!(report.applied.is_empty());
        assert_eq!(h.inventory.usage_writes(), 0);
        assert!(h.ledger.events().is_empty());
    }

    #[rstest]
    #[case::empty(request(&[], None), ErrorCode::InvalidRequest)]
    #[case::out_of_range(request(&[(2, 1.0)], None), ErrorCode::InvalidRequest)]
    #[case::unknown_device(
        UsageTestRequest { device_id: DeviceId::new("xl").expect("valid id"), ..request(&[(0, 1.0)], None) },
        ErrorCode::NotFound
    )]
    #[tokio::test]
    async fn rejects_invalid_requests(#[case] input: UsageTestRequest, #[case] code: ErrorCode) {
        let h = harness();
        let err = h.service.run_usage_test(input).await.expect_err("rejected");
        assert_eq!(err.code(), code);
    }
}
