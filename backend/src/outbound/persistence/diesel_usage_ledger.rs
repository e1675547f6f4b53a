//! PostgreSQL-backed `UsageLedger` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UsageLedger, UsageLedgerError};
use crate::domain::{DeviceId, SpoolId, ToolheadIndex, UsageEvent, UsageEventFilter};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::UsageEventRow;
use super::pool::{DbPool, PoolError};
use super::schema::usage_events;

/// Diesel-backed implementation of the usage ledger port.
#[derive(Clone)]
pub struct DieselUsageLedger {
    pool: DbPool,
}

impl DieselUsageLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UsageLedgerError {
    map_basic_pool_error(error, UsageLedgerError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UsageLedgerError {
    map_basic_diesel_error(
        error,
        UsageLedgerError::query,
        UsageLedgerError::connection,
    )
}

fn event_to_row(event: &UsageEvent) -> UsageEventRow {
    UsageEventRow {
        id: event.id,
        device_id: event.device_id.as_str().to_owned(),
        toolhead: i32::from(event.toolhead.value()),
        spool_id: event.spool_id.value(),
        grams: event.grams,
        job_label: event.job_label.clone(),
        recorded_at: event.recorded_at,
    }
}

fn row_to_event(row: UsageEventRow) -> Result<UsageEvent, UsageLedgerError> {
    let UsageEventRow {
        id,
        device_id,
        toolhead,
        spool_id,
        grams,
        job_label,
        recorded_at,
    } = row;
    Ok(UsageEvent {
        id,
        device_id: DeviceId::new(device_id)
            .map_err(|err| UsageLedgerError::query(format!("invalid device id: {err}")))?,
        toolhead: u16::try_from(toolhead)
            .map(ToolheadIndex::new)
            .map_err(|_| UsageLedgerError::query(format!("invalid toolhead: {toolhead}")))?,
        spool_id: SpoolId::new(spool_id)
            .map_err(|err| UsageLedgerError::query(format!("invalid spool id: {err}")))?,
        grams,
        job_label,
        recorded_at,
    })
}

#[async_trait]
impl UsageLedger for DieselUsageLedger {
    async fn append(&self, event: &UsageEvent) -> Result<(), UsageLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::insert_into(usage_events::table)
            .values(&event_to_row(event))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn list(&self, filter: &UsageEventFilter) -> Result<Vec<UsageEvent>, UsageLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let mut query = usage_events::table
            .select(UsageEventRow::as_select())
            .order((usage_events::recorded_at.desc(), usage_events::id.desc()))
            .limit(limit)
            .into_boxed();
        if let Some(device_id) = &filter.device_id {
            query = query.filter(usage_events::device_id.eq(device_id.as_str().to_owned()));
        }

        let rows: Vec<UsageEventRow> = query.load(&mut conn).await.map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    //! Row conversion coverage; no database required.

    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    use super::*;

    fn event() -> UsageEvent {
        UsageEvent {
            id: Uuid::new_v4(),
            device_id: DeviceId::new("voron").expect("valid id"),
            toolhead: ToolheadIndex::new(1),
            spool_id: SpoolId::new(7).expect("valid spool"),
            grams: 12.5,
            job_label: "benchy.gcode".to_owned(),
            recorded_at: Utc::now(),
        }
    }

    #[rstest]
    fn events_survive_row_conversion() {
        let original = event();
        assert_eq!(row_to_event(event_to_row(&original)), Ok(original));
    }

    #[rstest]
    fn corrupt_toolhead_is_a_query_error() {
        let row = UsageEventRow {
            toolhead: 70_000,
            ..event_to_row(&event())
        };
        assert!(matches!(
            row_to_event(row),
            Err(UsageLedgerError::Query { .. })
        ));
    }
}
