//! Domain port surface for counting reconciliation outcomes.
use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording reconciliation metrics.
    pub enum ReconciliationMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "reconciliation metrics exporter failed: {message}",
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// At least one delta was applied and nothing failed.
    Applied,
    /// Nothing was bound, so nothing was applied.
    Skipped,
    /// A failure was recorded.
    Failed,
}

impl ReconciliationOutcome {
    /// Label used for the `status` metric dimension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReconciliationMetrics: Send + Sync {
    /// Count one reconciliation run.
    async fn record(&self, outcome: ReconciliationOutcome)
    -> Result<(), ReconciliationMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpReconciliationMetrics;

#[async_trait]
impl ReconciliationMetrics for NoOpReconciliationMetrics {
    async fn record(
        &self,
        _outcome: ReconciliationOutcome,
    ) -> Result<(), ReconciliationMetricsError> {
        Ok(())
    }
}
