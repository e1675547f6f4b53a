//! Applies extracted usage to the inventory and records the outcome.
//!
//! One call handles one print. Every bound toolhead is processed even when an
//! earlier one fails; all failures of the call collapse into a single
//! [`ReconciliationError`] so the operator sees one record per print.

use std::sync::Arc;

use mockable::Clock;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::ports::{
    BindingStore, InventoryService, InventoryServiceError, ReconciliationErrorRepository,
    ReconciliationMetrics, ReconciliationOutcome, UsageLedger,
};
use super::{
    Binding, DeviceId, ReconciliationError, ReconciliationErrorId, ReconciliationErrorKind,
    SpoolId, StatusEvent, StatusEvents, ToolheadIndex, UsageByToolhead, UsageEvent,
};

/// Port bundle required by the reconciler.
pub struct UsageReconcilerPorts {
    /// Binding relation.
    pub bindings: Arc<dyn BindingStore>,
    /// External inventory.
    pub inventory: Arc<dyn InventoryService>,
    /// Usage history.
    pub ledger: Arc<dyn UsageLedger>,
    /// Dead-letter log.
    pub errors: Arc<dyn ReconciliationErrorRepository>,
    /// Outcome counters.
    pub metrics: Arc<dyn ReconciliationMetrics>,
}

/// Summary of one reconciliation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciliationReport {
    /// Deltas written to the inventory. Includes deltas whose ledger write
    /// failed, since the inventory already reflects them.
    pub applied: Vec<UsageEvent>,
    /// Toolheads with usage but no bound spool.
    pub skipped_unbound: Vec<ToolheadIndex>,
    /// Record created when anything failed.
    pub failure: Option<ReconciliationError>,
}

impl ReconciliationReport {
    /// Toolheads whose usage reached the inventory.
    pub fn applied_toolheads(&self) -> impl Iterator<Item = ToolheadIndex> + '_ {
        self.applied.iter().map(|event| event.toolhead)
    }

    /// Whether nothing failed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

struct StepFailure {
    kind: ReconciliationErrorKind,
    message: String,
}

/// Usage reconciler.
pub struct UsageReconciler {
    ports: UsageReconcilerPorts,
    events: StatusEvents,
    clock: Arc<dyn Clock>,
}

impl UsageReconciler {
    /// Build a reconciler.
    pub fn new(ports: UsageReconcilerPorts, events: StatusEvents, clock: Arc<dyn Clock>) -> Self {
        Self {
            ports,
            events,
            clock,
        }
    }

    /// Apply `usage` recorded by `device_id` for the print `job_label`.
    pub async fn reconcile(
        &self,
        device_id: &DeviceId,
        usage: &UsageByToolhead,
        job_label: &str,
    ) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        if usage.is_empty() {
            self.count(ReconciliationOutcome::Skipped).await;
            return report;
        }

        let bindings = match self.ports.bindings.all_bindings().await {
            Ok(bindings) => bindings,
            Err(err) => {
                report.failure = Some(
                    self.record_failure(
                        device_id,
                        Some(job_label),
                        ReconciliationErrorKind::BindingLookupFailed,
                        err.to_string(),
                    )
                    .await,
                );
                return report;
            }
        };

        let mut failures = Vec::new();
        for (toolhead, grams) in usage.iter() {
            let Some(binding) = find_binding(&bindings, device_id, toolhead) else {
                info!(%device_id, %toolhead, grams, "no spool bound; skipping usage");
                report.skipped_unbound.push(toolhead);
                continue;
            };
            let spool_id = binding.spool_id;

            if let Err(err) = self.apply_delta(spool_id, grams).await {
                warn!(%device_id, %toolhead, %spool_id, %err, "inventory update failed");
                failures.push(StepFailure {
                    kind: ReconciliationErrorKind::InventoryUpdateFailed,
                    message: format!("toolhead {toolhead} spool {spool_id} ({grams:.2} g): {err}"),
                });
                continue;
            }

            let event = UsageEvent {
                id: Uuid::new_v4(),
                device_id: device_id.clone(),
                toolhead,
                spool_id,
                grams,
                job_label: job_label.to_owned(),
                recorded_at: self.clock.utc(),
            };
            match self.ports.ledger.append(&event).await {
                Ok(()) => {
                    info!(%device_id, %toolhead, %spool_id, grams, job_label, "usage applied");
                    self.events.publish(StatusEvent::UsageRecorded(event.clone()));
                }
                Err(err) => {
                    warn!(%device_id, %toolhead, %spool_id, %err, "usage ledger write failed");
                    failures.push(StepFailure {
                        kind: ReconciliationErrorKind::LedgerWriteFailed,
                        message: format!(
                            "toolhead {toolhead} spool {spool_id} ({grams:.2} g) applied but not recorded: {err}"
                        ),
                    });
                }
            }
            report.applied.push(event);
        }

        if let Some(first) = failures.first() {
            let kind = first.kind;
            let message = failures
                .iter()
                .map(|failure| failure.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            report.failure = Some(
                self.record_failure(device_id, Some(job_label), kind, message)
                    .await,
            );
        } else if report.applied.is_empty() {
            self.count(ReconciliationOutcome::Skipped).await;
        } else {
            self.count(ReconciliationOutcome::Applied).await;
        }
        report
    }

    /// Record a failed completion in the dead-letter log and broadcast it.
    ///
    /// A failing log write is reported but never propagated; the returned
    /// record is still published so live dashboards see it.
    pub async fn record_failure(
        &self,
        device_id: &DeviceId,
        job_label: Option<&str>,
        kind: ReconciliationErrorKind,
        message: impl Into<String>,
    ) -> ReconciliationError {
        let record = ReconciliationError {
            id: ReconciliationErrorId::random(),
            device_id: device_id.clone(),
            job_label: job_label.map(str::to_owned),
            kind,
            message: message.into(),
            occurred_at: self.clock.utc(),
            acknowledged: false,
        };
        error!(
            %device_id,
            job_label = record.job_label.as_deref(),
            %kind,
            message = %record.message,
            "reconciliation failed"
        );
        if let Err(err) = self.ports.errors.record(&record).await {
            error!(%device_id, %err, "failed to store reconciliation error");
        }
        self.events
            .publish(StatusEvent::ReconciliationFailed(record.clone()));
        self.count(ReconciliationOutcome::Failed).await;
        record
    }

    async fn apply_delta(&self, spool_id: SpoolId, grams: f64) -> Result<(), InventoryServiceError> {
        let current = self.ports.inventory.spool_usage(spool_id).await?;
        self.ports
            .inventory
            .set_spool_usage(spool_id, current + grams)
            .await
    }

    async fn count(&self, outcome: ReconciliationOutcome) {
        if let Err(err) = self.ports.metrics.record(outcome).await {
            warn!(%err, outcome = outcome.as_str(), "reconciliation metric write failed");
        }
    }
}

fn find_binding<'a>(
    bindings: &'a [Binding],
    device_id: &DeviceId,
    toolhead: ToolheadIndex,
) -> Option<&'a Binding> {
    bindings
        .iter()
        .find(|binding| binding.occupies(device_id, toolhead))
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
