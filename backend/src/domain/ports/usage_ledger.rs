//! Driven port for the append-only usage history.
use async_trait::async_trait;

use crate::domain::{UsageEvent, UsageEventFilter};

use super::define_port_error;

define_port_error! {
    /// Errors raised by usage ledger adapters.
    pub enum UsageLedgerError {
        /// Ledger connection could not be established.
        Connection { message: String } => "usage ledger connection failed: {message}",
        /// Query or insert failed during execution.
        Query { message: String } => "usage ledger query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Append one applied delta.
    async fn append(&self, event: &UsageEvent) -> Result<(), UsageLedgerError>;

    /// List events newest first.
    async fn list(&self, filter: &UsageEventFilter) -> Result<Vec<UsageEvent>, UsageLedgerError>;
}

/// Fixture ledger that discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUsageLedger;

#[async_trait]
impl UsageLedger for FixtureUsageLedger {
    async fn append(&self, _event: &UsageEvent) -> Result<(), UsageLedgerError> {
        Ok(())
    }

    async fn list(&self, _filter: &UsageEventFilter) -> Result<Vec<UsageEvent>, UsageLedgerError> {
        Ok(Vec::new())
    }
}
