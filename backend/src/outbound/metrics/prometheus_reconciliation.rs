//! Prometheus adapter for reconciliation outcome counters.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::ports::{
    ReconciliationMetrics, ReconciliationMetricsError, ReconciliationOutcome,
};

/// Prometheus-backed recorder exposing `reconciliations_total{status}`.
pub struct PrometheusReconciliationMetrics {
    reconciliations_total: CounterVec,
}

impl PrometheusReconciliationMetrics {
    /// Create and register the counter with the provided registry.
    ///
    /// # Errors
    ///
    /// Returns an error when Prometheus rejects metric registration.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let reconciliations_total = CounterVec::new(
            Opts::new(
                "reconciliations_total",
                "Completed print reconciliations by outcome",
            ),
            &["status"],
        )?;
        registry.register(Box::new(reconciliations_total.clone()))?;
        Ok(Self {
            reconciliations_total,
        })
    }
}

#[async_trait]
impl ReconciliationMetrics for PrometheusReconciliationMetrics {
    async fn record(
        &self,
        outcome: ReconciliationOutcome,
    ) -> Result<(), ReconciliationMetricsError> {
        self.reconciliations_total
            .get_metric_with_label_values(&[outcome.as_str()])
            .map_err(|err| ReconciliationMetricsError::export(err.to_string()))?
            .inc();
        Ok(())
    }
}
