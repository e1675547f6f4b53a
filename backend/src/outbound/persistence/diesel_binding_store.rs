//! PostgreSQL-backed `BindingStore` implementation using Diesel ORM.
//!
//! `bind` runs the holder lookup and the upsert in one transaction with row
//! locks on the rows it reads. Two concurrent binds of a spool nobody holds
//! yet both see an empty holder; the `bindings_spool_id_key` constraint then
//! rejects the second insert, which is reported as the same conflict.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{BindingStore, BindingStoreError};
use crate::domain::{BindOutcome, Binding, DeviceId, SpoolId, ToolheadIndex};

use super::diesel_basic_error_mapping::{
    ConstraintViolation, constraint_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::BindingRow;
use super::pool::{DbPool, PoolError};
use super::schema::bindings;

/// Diesel-backed implementation of the binding store port.
#[derive(Clone)]
pub struct DieselBindingStore {
    pool: DbPool,
}

impl DieselBindingStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> BindingStoreError {
    map_basic_pool_error(error, BindingStoreError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> BindingStoreError {
    map_basic_diesel_error(
        error,
        BindingStoreError::query,
        BindingStoreError::connection,
    )
}

fn toolhead_for_db(toolhead: ToolheadIndex) -> i32 {
    i32::from(toolhead.value())
}

fn row_to_binding(row: BindingRow) -> Result<Binding, BindingStoreError> {
    let BindingRow {
        device_id,
        toolhead,
        spool_id,
        assigned_at,
    } = row;
    let device_id = DeviceId::new(device_id)
        .map_err(|err| BindingStoreError::query(format!("invalid device id in database: {err}")))?;
    let toolhead = u16::try_from(toolhead)
        .map(ToolheadIndex::new)
        .map_err(|_| BindingStoreError::query(format!("invalid toolhead in database: {toolhead}")))?;
    let spool_id = spool_from_db(spool_id)?;
    Ok(Binding {
        device_id,
        toolhead,
        spool_id,
        assigned_at,
    })
}

fn spool_from_db(value: i64) -> Result<SpoolId, BindingStoreError> {
    SpoolId::new(value)
        .map_err(|err| BindingStoreError::query(format!("invalid spool id in database: {err}")))
}

fn binding_row(binding: &Binding) -> BindingRow {
    BindingRow {
        device_id: binding.device_id.as_str().to_owned(),
        toolhead: toolhead_for_db(binding.toolhead),
        spool_id: binding.spool_id.value(),
        assigned_at: binding.assigned_at,
    }
}

fn conflict_with(holder: &Binding) -> BindingStoreError {
    BindingStoreError::conflict(holder.device_id.clone(), holder.toolhead, holder.spool_id)
}

/// Decide the outcome of a bind given the current holder of the spool.
///
/// `Ok(None)` means the write should go ahead.
fn check_holder(
    binding: &Binding,
    holder: Option<Binding>,
) -> Result<Option<BindOutcome>, BindingStoreError> {
    match holder {
        Some(holder) if holder.occupies(&binding.device_id, binding.toolhead) => {
            Ok(Some(BindOutcome::Unchanged))
        }
        Some(holder) => Err(conflict_with(&holder)),
        None => Ok(None),
    }
}

/// Outcome of a bind whose insert lost to a concurrent bind of the same spool.
///
/// The winner is re-read outside the failed transaction. A holder that has
/// already been released again leaves nothing to report against.
fn resolve_lost_race(
    binding: &Binding,
    holder: Option<Binding>,
) -> Result<BindOutcome, BindingStoreError> {
    check_holder(binding, holder)?
        .ok_or_else(|| BindingStoreError::query("concurrent bind detected"))
}

async fn holder_of(
    conn: &mut AsyncPgConnection,
    spool_id: SpoolId,
    lock: bool,
) -> Result<Option<BindingRow>, diesel::result::Error> {
    let query = bindings::table
        .filter(bindings::spool_id.eq(spool_id.value()))
        .select(BindingRow::as_select());
    if lock {
        query.for_update().first(conn).await.optional()
    } else {
        query.first(conn).await.optional()
    }
}

type BindAttempt = Result<Result<BindOutcome, BindingStoreError>, diesel::result::Error>;

/// Lookup and upsert under one transaction.
///
/// Domain rejections ride in the inner result so they commit an empty
/// transaction instead of being confused with database failures.
async fn bind_in_transaction(conn: &mut AsyncPgConnection, binding: &Binding) -> BindAttempt {
    let row = binding_row(binding);

    conn.transaction(|conn| {
        async move {
            let holder = match holder_of(conn, binding.spool_id, true)
                .await?
                .map(row_to_binding)
                .transpose()
            {
                Ok(holder) => holder,
                Err(err) => return Ok(Err(err)),
            };
            match check_holder(binding, holder) {
                Ok(Some(outcome)) => return Ok(Ok(outcome)),
                Err(err) => return Ok(Err(err)),
                Ok(None) => {}
            }

            let previous: Option<i64> = bindings::table
                .find((row.device_id.as_str(), row.toolhead))
                .select(bindings::spool_id)
                .for_update()
                .first(conn)
                .await
                .optional()?;

            diesel::insert_into(bindings::table)
                .values(&row)
                .on_conflict((bindings::device_id, bindings::toolhead))
                .do_update()
                .set((
                    bindings::spool_id.eq(excluded(bindings::spool_id)),
                    bindings::assigned_at.eq(excluded(bindings::assigned_at)),
                ))
                .execute(conn)
                .await?;

            Ok(match previous.map(spool_from_db).transpose() {
                Ok(Some(previous)) => Ok(BindOutcome::Replaced { previous }),
                Ok(None) => Ok(BindOutcome::Created),
                Err(err) => Err(err),
            })
        }
        .scope_boxed()
    })
    .await
}

#[async_trait]
impl BindingStore for DieselBindingStore {
    async fn bind(&self, binding: &Binding) -> Result<BindOutcome, BindingStoreError> {
        let attempt = {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            bind_in_transaction(&mut conn, binding).await
        };
        let error = match attempt {
            Ok(outcome) => return outcome,
            Err(error) => error,
        };
        match constraint_violation(&error) {
            Some((ConstraintViolation::Unique, _)) => {
                let holder = self.find_by_spool(binding.spool_id).await?;
                resolve_lost_race(binding, holder)
            }
            Some((ConstraintViolation::ForeignKey, _)) => Err(BindingStoreError::unknown_device(
                binding.device_id.clone(),
            )),
            None => Err(map_diesel_error(error)),
        }
    }

    async fn unbind(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed: Option<i64> = diesel::delete(
            bindings::table.find((device_id.as_str(), toolhead_for_db(toolhead))),
        )
        .returning(bindings::spool_id)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        removed.map(spool_from_db).transpose()
    }

    async fn unbind_spool(&self, spool_id: SpoolId) -> Result<Option<Binding>, BindingStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed = diesel::delete(bindings::table.filter(bindings::spool_id.eq(spool_id.value())))
            .returning(BindingRow::as_returning())
            .get_result::<BindingRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        removed.map(row_to_binding).transpose()
    }

    async fn lookup(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let spool: Option<i64> = bindings::table
            .find((device_id.as_str(), toolhead_for_db(toolhead)))
            .select(bindings::spool_id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        spool.map(spool_from_db).transpose()
    }

    async fn find_by_spool(
        &self,
        spool_id: SpoolId,
    ) -> Result<Option<Binding>, BindingStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        holder_of(&mut conn, spool_id, false)
            .await
            .map_err(map_diesel_error)?
            .map(row_to_binding)
            .transpose()
    }

    async fn all_bindings(&self) -> Result<Vec<Binding>, BindingStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<BindingRow> = bindings::table
            .order((bindings::device_id.asc(), bindings::toolhead.asc()))
            .select(BindingRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(row_to_binding).collect()
    }
}
