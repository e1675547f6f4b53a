//! Usage history and reconciliation error log queries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::ports::{LedgerCommand, LedgerQuery, ReconciliationErrorRepository, UsageLedger};
use super::service_errors::{map_error_log_error, map_ledger_error};
use super::{
    Error, MAX_USAGE_LIMIT, ReconciliationError, ReconciliationErrorId, UsageEvent,
    UsageEventFilter,
};

/// Ledger service implementing [`LedgerQuery`] and [`LedgerCommand`].
pub struct LedgerService<E, U> {
    errors: Arc<E>,
    usage: Arc<U>,
}

impl<E, U> LedgerService<E, U> {
    /// Create a service over the error log and usage ledger.
    pub fn new(errors: Arc<E>, usage: Arc<U>) -> Self {
        Self { errors, usage }
    }
}

#[async_trait]
impl<E, U> LedgerQuery for LedgerService<E, U>
where
    E: ReconciliationErrorRepository,
    U: UsageLedger,
{
    async fn reconciliation_errors(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, Error> {
        self.errors
            .list(include_acknowledged)
            .await
            .map_err(map_error_log_error)
    }

    async fn usage_events(&self, filter: UsageEventFilter) -> Result<Vec<UsageEvent>, Error> {
        let filter = UsageEventFilter {
            limit: filter.limit.clamp(1, MAX_USAGE_LIMIT),
            ..filter
        };
        self.usage.list(&filter).await.map_err(map_ledger_error)
    }
}

#[async_trait]
impl<E, U> LedgerCommand for LedgerService<E, U>
where
    E: ReconciliationErrorRepository,
    U: UsageLedger,
{
    async fn acknowledge(&self, id: &ReconciliationErrorId) -> Result<(), Error> {
        let found = self
            .errors
            .acknowledge(id)
            .await
            .map_err(map_error_log_error)?;
        if !found {
            return Err(Error::not_found(format!(
                "reconciliation error {id} not found"
            )));
        }
        info!(error_id = %id, "reconciliation error acknowledged");
        Ok(())
    }
}
