//! Driven port for the reconciliation dead-letter log.
use async_trait::async_trait;

use crate::domain::{ReconciliationError, ReconciliationErrorId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by reconciliation error repository adapters.
    pub enum ReconciliationErrorRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "reconciliation error repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "reconciliation error repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReconciliationErrorRepository: Send + Sync {
    /// Store a new record.
    async fn record(
        &self,
        error: &ReconciliationError,
    ) -> Result<(), ReconciliationErrorRepositoryError>;

    /// List records newest first, optionally including acknowledged ones.
    async fn list(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, ReconciliationErrorRepositoryError>;

    /// Flag a record as acknowledged. Returns `false` when it does not exist.
    async fn acknowledge(
        &self,
        id: &ReconciliationErrorId,
    ) -> Result<bool, ReconciliationErrorRepositoryError>;
}

/// Fixture repository that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureReconciliationErrorRepository;

#[async_trait]
impl ReconciliationErrorRepository for FixtureReconciliationErrorRepository {
    async fn record(
        &self,
        _error: &ReconciliationError,
    ) -> Result<(), ReconciliationErrorRepositoryError> {
        Ok(())
    }

    async fn list(
        &self,
        _include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, ReconciliationErrorRepositoryError> {
        Ok(Vec::new())
    }

    async fn acknowledge(
        &self,
        _id: &ReconciliationErrorId,
    ) -> Result<bool, ReconciliationErrorRepositoryError> {
        Ok(false)
    }
}
