//! PostgreSQL-backed `ReconciliationErrorRepository` using Diesel ORM.

use std::str::FromStr;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{ReconciliationErrorRepository, ReconciliationErrorRepositoryError};
use crate::domain::{
    DeviceId, ReconciliationError, ReconciliationErrorId, ReconciliationErrorKind,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::ReconciliationErrorRow;
use super::pool::{DbPool, PoolError};
use super::schema::reconciliation_errors;

/// Diesel-backed implementation of the reconciliation error log.
#[derive(Clone)]
pub struct DieselReconciliationErrorRepository {
    pool: DbPool,
}

impl DieselReconciliationErrorRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ReconciliationErrorRepositoryError {
    map_basic_pool_error(error, ReconciliationErrorRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ReconciliationErrorRepositoryError {
    map_basic_diesel_error(
        error,
        ReconciliationErrorRepositoryError::query,
        ReconciliationErrorRepositoryError::connection,
    )
}

fn record_to_row(record: &ReconciliationError) -> ReconciliationErrorRow {
    ReconciliationErrorRow {
        id: *record.id.as_uuid(),
        device_id: record.device_id.as_str().to_owned(),
        job_label: record.job_label.clone(),
        kind: record.kind.as_str().to_owned(),
        message: record.message.clone(),
        occurred_at: record.occurred_at,
        acknowledged: record.acknowledged,
    }
}

fn row_to_record(
    row: ReconciliationErrorRow,
) -> Result<ReconciliationError, ReconciliationErrorRepositoryError> {
    let ReconciliationErrorRow {
        id,
        device_id,
        job_label,
        kind,
        message,
        occurred_at,
        acknowledged,
    } = row;
    Ok(ReconciliationError {
        id: ReconciliationErrorId::from_uuid(id),
        device_id: DeviceId::new(device_id).map_err(|err| {
            ReconciliationErrorRepositoryError::query(format!("invalid device id: {err}"))
        })?,
        job_label,
        kind: ReconciliationErrorKind::from_str(&kind)
            .map_err(ReconciliationErrorRepositoryError::query)?,
        message,
        occurred_at,
        acknowledged,
    })
}

#[async_trait]
impl ReconciliationErrorRepository for DieselReconciliationErrorRepository {
    async fn record(
        &self,
        error: &ReconciliationError,
    ) -> Result<(), ReconciliationErrorRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::insert_into(reconciliation_errors::table)
            .values(&record_to_row(error))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn list(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, ReconciliationErrorRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = reconciliation_errors::table
            .select(ReconciliationErrorRow::as_select())
            .order((
                reconciliation_errors::occurred_at.desc(),
                reconciliation_errors::id.desc(),
            ))
            .into_boxed();
        if !include_acknowledged {
            query = query.filter(reconciliation_errors::acknowledged.eq(false));
        }

        let rows: Vec<ReconciliationErrorRow> =
            query.load(&mut conn).await.map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn acknowledge(
        &self,
        id: &ReconciliationErrorId,
    ) -> Result<bool, ReconciliationErrorRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(reconciliation_errors::table.find(id.as_uuid()))
            .set(reconciliation_errors::acknowledged.eq(true))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }
}
