//! Driving ports for the usage history and the reconciliation error log.

use async_trait::async_trait;

use crate::domain::{
    DeviceId, Error, ReconciliationError, ReconciliationErrorId, ReconciliationReport,
    UsageByToolhead, UsageEvent, UsageEventFilter,
};

/// Domain use-case port for reading the ledgers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Reconciliation errors, newest first.
    async fn reconciliation_errors(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, Error>;

    /// Usage events, newest first.
    async fn usage_events(&self, filter: UsageEventFilter) -> Result<Vec<UsageEvent>, Error>;
}

/// Domain use-case port for operator actions on the error log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerCommand: Send + Sync {
    /// Acknowledge a reconciliation error. Repeating is harmless; unknown ids
    /// are `not_found`.
    async fn acknowledge(&self, id: &ReconciliationErrorId) -> Result<(), Error>;
}

/// Manual usage trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageTestRequest {
    /// Device the usage is attributed to.
    pub device_id: DeviceId,
    /// Usage per toolhead.
    pub usage: UsageByToolhead,
    /// Label recorded with the events; defaults to a manual marker.
    pub job_label: Option<String>,
}

/// Domain use-case port for the manual usage trigger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageTestCommand: Send + Sync {
    /// Run the reconciler with operator-supplied usage.
    async fn run_usage_test(&self, request: UsageTestRequest)
    -> Result<ReconciliationReport, Error>;
}

/// Fixture ledger with no records.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureLedger;

#[async_trait]
impl LedgerQuery for FixtureLedger {
    async fn reconciliation_errors(
        &self,
        _include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, Error> {
        Ok(Vec::new())
    }

    async fn usage_events(&self, _filter: UsageEventFilter) -> Result<Vec<UsageEvent>, Error> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl LedgerCommand for FixtureLedger {
    async fn acknowledge(&self, id: &ReconciliationErrorId) -> Result<(), Error> {
        Err(Error::not_found(format!("reconciliation error {id} not found")))
    }
}

#[async_trait]
impl UsageTestCommand for FixtureLedger {
    async fn run_usage_test(
        &self,
        _request: UsageTestRequest,
    ) -> Result<ReconciliationReport, Error> {
        Ok(ReconciliationReport::default())
    }
}
