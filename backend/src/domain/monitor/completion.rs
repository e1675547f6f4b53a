//! Completion handling: download, extract, reconcile.
//!
//! Runs on its own task with no shared lock held. Every failure path ends in
//! exactly one reconciliation error record.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{DeviceStatusSource, DeviceStatusSourceError};
use crate::domain::{
    Device, ReconciliationErrorKind, ToolheadIndex, UsageReconciler, extract_usage,
};

use super::runtime::{DownloadPolicy, DownloadRuntime};

/// Outcome fed back into the device's tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CompletionReport {
    pub(crate) succeeded: bool,
    pub(crate) applied: Vec<ToolheadIndex>,
}

impl CompletionReport {
    fn failed() -> Self {
        Self::default()
    }
}

enum DownloadError {
    Rejected(DeviceStatusSourceError),
    Exhausted {
        attempts: u32,
        last: DeviceStatusSourceError,
    },
    TimedOut(Duration),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "download rejected: {err}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "download failed after {attempts} attempt(s): {last}")
            }
            Self::TimedOut(budget) => {
                write!(f, "download did not finish within {}s", budget.as_secs())
            }
        }
    }
}

/// Shared collaborators for completion handling.
pub(crate) struct CompletionHandler {
    pub(crate) source: Arc<dyn DeviceStatusSource>,
    pub(crate) reconciler: Arc<UsageReconciler>,
    pub(crate) policy: DownloadPolicy,
    pub(crate) runtime: DownloadRuntime,
    pub(crate) clock: Arc<dyn Clock>,
}

impl CompletionHandler {
    /// Handle one finished print. Toolheads in `already_applied` were applied
    /// by an earlier attempt for the same label and are skipped.
    pub(crate) async fn handle(
        &self,
        device: &Device,
        job_label: Option<String>,
        already_applied: BTreeSet<ToolheadIndex>,
    ) -> CompletionReport {
        let device_id = device.id();
        let Some(label) = job_label else {
            self.reconciler
                .record_failure(
                    device_id,
                    None,
                    ReconciliationErrorKind::DownloadFailed,
                    "print finished but no file label was captured",
                )
                .await;
            return CompletionReport::failed();
        };

        let payload = match self.download(device, &label).await {
            Ok(payload) => payload,
            Err(err) => {
                self.reconciler
                    .record_failure(
                        device_id,
                        Some(&label),
                        ReconciliationErrorKind::DownloadFailed,
                        err.to_string(),
                    )
                    .await;
                return CompletionReport::failed();
            }
        };

        let usage = match tokio::task::spawn_blocking(move || extract_usage(&payload)).await {
            Ok(usage) => usage,
            Err(err) => {
                self.reconciler
                    .record_failure(
                        device_id,
                        Some(&label),
                        ReconciliationErrorKind::NoUsageData,
                        format!("usage extraction aborted: {err}"),
                    )
                    .await;
                return CompletionReport::failed();
            }
        };
        if usage.is_empty() {
            self.reconciler
                .record_failure(
                    device_id,
                    Some(&label),
                    ReconciliationErrorKind::NoUsageData,
                    format!("{label} carries no filament usage data"),
                )
                .await;
            return CompletionReport::failed();
        }

        let pending = usage.filtered(|toolhead| !already_applied.contains(&toolhead));
        info!(%device_id, job_label = %label, toolheads = pending.len(), "reconciling usage");
        let report = self.reconciler.reconcile(device_id, &pending, &label).await;
        CompletionReport {
            succeeded: report.succeeded(),
            applied: report.applied_toolheads().collect(),
        }
    }

    async fn download(&self, device: &Device, label: &str) -> Result<Vec<u8>, DownloadError> {
        let budget = self.policy.overall_timeout;
        tokio::time::timeout(budget, self.download_with_retries(device, label))
            .await
            .map_err(|_| DownloadError::TimedOut(budget))?
    }

    async fn download_with_retries(
        &self,
        device: &Device,
        label: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.download_file(device, label).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let base = self.policy.retry_base_delay(attempt);
                    let delay = self
                        .runtime
                        .jitter
                        .jittered_delay(base, attempt, self.clock.utc());
                    warn!(
                        device_id = %device.id(),
                        job_label = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %err,
                        "download failed; retrying"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(DownloadError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => return Err(DownloadError::Rejected(err)),
            }
        }
    }
}
