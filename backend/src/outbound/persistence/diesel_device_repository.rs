//! PostgreSQL-backed `DeviceRepository` implementation using Diesel ORM.
//!
//! Rows are re-validated through [`Device::new`] on the way out so a
//! hand-edited table cannot smuggle an invalid device into the domain.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{DeviceRepository, DeviceRepositoryError};
use crate::domain::{Device, DeviceDraft, DeviceId, MachineState};

use super::diesel_basic_error_mapping::{
    ConstraintViolation, constraint_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{DeviceRow, DeviceUpdate, NewDeviceRow};
use super::pool::{DbPool, PoolError};
use super::schema::devices;

/// Diesel-backed implementation of the device repository port.
#[derive(Clone)]
pub struct DieselDeviceRepository {
    pool: DbPool,
}

impl DieselDeviceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DeviceRepositoryError {
    map_basic_pool_error(error, DeviceRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DeviceRepositoryError {
    map_basic_diesel_error(
        error,
        DeviceRepositoryError::query,
        DeviceRepositoryError::connection,
    )
}

/// Map a write failure, turning integrity violations into domain variants.
fn map_write_error(error: diesel::result::Error, id: &DeviceId) -> DeviceRepositoryError {
    match constraint_violation(&error) {
        Some((ConstraintViolation::Unique, _)) => DeviceRepositoryError::duplicate(id.clone()),
        Some((ConstraintViolation::ForeignKey, _)) => DeviceRepositoryError::in_use(id.clone()),
        None => map_diesel_error(error),
    }
}

fn toolhead_count_for_db(device: &Device) -> i32 {
    i32::from(device.toolhead_count())
}

/// Convert a database row into a validated domain device.
fn row_to_device(row: DeviceRow) -> Result<Device, DeviceRepositoryError> {
    let DeviceRow {
        id,
        name,
        address,
        credential,
        toolhead_count,
        last_state,
        created_at: _,
        updated_at: _,
    } = row;

    let toolhead_count = u16::try_from(toolhead_count).map_err(|_| {
        DeviceRepositoryError::query(format!("invalid toolhead count in database: {toolhead_count}"))
    })?;
    let last_state = MachineState::from_str(&last_state)
        .map_err(|err| DeviceRepositoryError::query(err.to_string()))?;

    Device::new(DeviceDraft {
        id,
        name,
        address,
        credential,
        toolhead_count,
    })
    .map(|device| device.with_last_state(last_state))
    .map_err(|err| DeviceRepositoryError::query(format!("invalid device in database: {err}")))
}

#[async_trait]
impl DeviceRepository for DieselDeviceRepository {
    async fn list(&self) -> Result<Vec<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<DeviceRow> = devices::table
            .order(devices::id.asc())
            .select(DeviceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(row_to_device).collect()
    }

    async fn find(&self, id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = devices::table
            .find(id.as_str())
            .select(DeviceRow::as_select())
            .first::<DeviceRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_device).transpose()
    }

    async fn insert(&self, device: &Device) -> Result<(), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let address = device.address().map(url::Url::as_str);
        let credential = device.credential().map(|secret| secret.expose());

        let row = NewDeviceRow {
            id: device.id().as_str(),
            name: device.name(),
            address,
            credential,
            toolhead_count: toolhead_count_for_db(device),
            last_state: device.last_state().as_str(),
        };

        diesel::insert_into(devices::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_write_error(err, device.id()))
    }

    async fn update(&self, device: &Device) -> Result<bool, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let changes = DeviceUpdate {
            name: device.name(),
            address: device.address().map(url::Url::as_str),
            credential: device.credential().map(|secret| secret.expose()),
            toolhead_count: toolhead_count_for_db(device),
            updated_at: Utc::now(),
        };

        let updated = diesel::update(devices::table.find(device.id().as_str()))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(|err| map_write_error(err, device.id()))?;
        Ok(updated > 0)
    }

    async fn delete(&self, id: &DeviceId) -> Result<bool, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(devices::table.find(id.as_str()))
            .execute(&mut conn)
            .await
            .map_err(|err| map_write_error(err, id))?;
        Ok(deleted > 0)
    }

    async fn record_machine_state(
        &self,
        id: &DeviceId,
        state: MachineState,
    ) -> Result<(), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(devices::table.find(id.as_str()))
            .set(devices::last_state.eq(state.as_str()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    //! Row conversion and error mapping coverage; no database required.

    use chrono::Utc;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    use super::*;

    fn row() -> DeviceRow {
        DeviceRow {
            id: "voron".to_owned(),
            name: "Voron 2.4".to_owned(),
            address: Some("http://voron.lan".to_owned()),
            credential: Some("secret".to_owned()),
            toolhead_count: 2,
            last_state: "printing".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn id() -> DeviceId {
        DeviceId::new("voron").expect("valid id")
    }

    #[rstest]
    fn row_converts_into_device_with_state() {
        let device = row_to_device(row()).expect("valid row");
        assert_eq!(device.id(), &id());
        assert_eq!(device.toolhead_count(), 2);
        assert_eq!(device.last_state(), MachineState::Printing);
        assert_eq!(device.credential().map(|s| s.expose()), Some("secret"));
    }

    #[rstest]
    #[case::negative_toolheads(DeviceRow { toolhead_count: -1, ..row() })]
    #[case::unknown_state(DeviceRow { last_state: "melting".to_owned(), ..row() })]
    #[case::invalid_slug(DeviceRow { id: "Voron 2".to_owned(), ..row() })]
    fn corrupt_rows_are_query_errors(#[case] input: DeviceRow) {
        let err = row_to_device(input).expect_err("corrupt row");
        assert!(matches!(err, DeviceRepositoryError::Query { .. }));
    }

    #[rstest]
    fn unique_violation_is_duplicate() {
        let err = map_write_error(
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                Box::new("devices_pkey".to_owned()),
            ),
            &id(),
        );
        assert_eq!(err, DeviceRepositoryError::duplicate(id()));
    }

    #[rstest]
    fn foreign_key_violation_is_in_use() {
        let err = map_write_error(
            DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                Box::new("bindings_device_id_fkey".to_owned()),
            ),
            &id(),
        );
        assert_eq!(err, DeviceRepositoryError::in_use(id()));
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("refused"));
        assert!(matches!(err, DeviceRepositoryError::Connection { .. }));
    }
}
