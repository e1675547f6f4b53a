//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered devices.
    ///
    /// `last_state` holds the lowercase label of the last observed machine
    /// state so the dashboard has something to show before the first poll.
    devices (id) {
        /// Operator-chosen slug.
        id -> Varchar,
        /// Display name.
        name -> Varchar,
        /// Base URL of the device API; `NULL` for placeholder devices.
        address -> Nullable<Text>,
        /// API key presented to the device.
        credential -> Nullable<Text>,
        /// Declared toolhead count (1..=16).
        toolhead_count -> Int4,
        /// Last observed machine state label.
        last_state -> Varchar,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Toolhead-to-spool relation.
    ///
    /// `(device_id, toolhead)` is the primary key and `spool_id` carries the
    /// `bindings_spool_id_key` unique constraint.
    bindings (device_id, toolhead) {
        /// Owning device.
        device_id -> Varchar,
        /// Zero-based toolhead index.
        toolhead -> Int4,
        /// Inventory spool identifier.
        spool_id -> Int8,
        /// When the spool was mounted.
        assigned_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only history of applied consumption deltas.
    usage_events (id) {
        id -> Uuid,
        device_id -> Varchar,
        toolhead -> Int4,
        spool_id -> Int8,
        grams -> Float8,
        job_label -> Text,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    /// Completions that need operator follow-up.
    reconciliation_errors (id) {
        id -> Uuid,
        device_id -> Varchar,
        job_label -> Nullable<Text>,
        /// Snake-case failure stage label.
        kind -> Varchar,
        message -> Text,
        occurred_at -> Timestamptz,
        acknowledged -> Bool,
    }
}

diesel::joinable!(bindings -> devices (device_id));

diesel::allow_tables_to_appear_in_same_query!(bindings, devices, reconciliation_errors, usage_events);
