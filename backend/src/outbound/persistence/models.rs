//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversion into validated domain types
//! lives next to each repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{bindings, devices, reconciliation_errors, usage_events};

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Row struct for reading from the devices table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DeviceRow {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub credential: Option<String>,
    pub toolhead_count: i32,
    pub last_state: String,
    #[expect(dead_code, reason = "audit column read for completeness")]
    pub created_at: DateTime<Utc>,
    #[expect(dead_code, reason = "audit column read for completeness")]
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for new devices.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = devices)]
pub(crate) struct NewDeviceRow<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub address: Option<&'a str>,
    pub credential: Option<&'a str>,
    pub toolhead_count: i32,
    pub last_state: &'a str,
}

/// Changeset replacing the operator-editable device fields.
///
/// `treat_none_as_null` lets an update clear the address or credential.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = devices)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct DeviceUpdate<'a> {
    pub name: &'a str,
    pub address: Option<&'a str>,
    pub credential: Option<&'a str>,
    pub toolhead_count: i32,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Row struct for reading and inserting bindings.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = bindings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BindingRow {
    pub device_id: String,
    pub toolhead: i32,
    pub spool_id: i64,
    pub assigned_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Usage events
// ---------------------------------------------------------------------------

/// Row struct for reading and inserting usage events.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = usage_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UsageEventRow {
    pub id: Uuid,
    pub device_id: String,
    pub toolhead: i32,
    pub spool_id: i64,
    pub grams: f64,
    pub job_label: String,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reconciliation errors
// ---------------------------------------------------------------------------

/// Row struct for reading and inserting reconciliation error records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = reconciliation_errors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReconciliationErrorRow {
    pub id: Uuid,
    pub device_id: String,
    pub job_label: Option<String>,
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub acknowledged: bool,
}
