//! Shared Diesel error mapping for the spoolkeeper repositories.
//!
//! Each repository supplies constructors for its own port error; the helpers
//! here decide which constructor applies. Constraint violations are surfaced
//! separately so adapters can translate them into domain conflicts.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Constraint named in the migrations for the global spool uniqueness rule.
pub const SPOOL_UNIQUE_CONSTRAINT: &str = "bindings_spool_id_key";
/// Constraint named by PostgreSQL for the binding-to-device foreign key.
pub const BINDING_DEVICE_FK: &str = "bindings_device_id_fkey";

/// Integrity violation reported by PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// A unique or primary key constraint rejected the write.
    Unique,
    /// A foreign key constraint rejected the write.
    ForeignKey,
}

/// Classify an integrity violation and report the constraint it names.
///
/// The constraint name falls back to the error message because drivers do not
/// always populate the structured field.
pub fn constraint_violation(error: &DieselError) -> Option<(ConstraintViolation, String)> {
    let DieselError::DatabaseError(kind, info) = error else {
        return None;
    };
    let violation = match kind {
        DatabaseErrorKind::UniqueViolation => ConstraintViolation::Unique,
        DatabaseErrorKind::ForeignKeyViolation => ConstraintViolation::ForeignKey,
        _ => return None,
    };
    let name = info
        .constraint_name()
        .map_or_else(|| info.message().to_owned(), str::to_owned);
    Some((violation, name))
}

/// Map pool errors into a repository-specific connection error constructor.
pub fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map common Diesel error variants into query/connection constructors.
pub fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(&'static str) -> E,
    C: Fn(&'static str) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::QueryBuilderError(_) => query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            query("concurrent update detected")
        }
        _ => query("database error"),
    }
}

#[cfg(test)]
mod tests {
    //! Classification coverage for Diesel failures.

    use rstest::rstest;

    use super::*;

    fn database_error(kind: DatabaseErrorKind, message: &str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(message.to_owned()))
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Mapped {
        Query(&'static str),
        Connection(&'static str),
    }

    fn map(error: DieselError) -> Mapped {
        map_basic_diesel_error(error, Mapped::Query, Mapped::Connection)
    }

    #[rstest]
    #[case(DatabaseErrorKind::UniqueViolation, Some(ConstraintViolation::Unique))]
    #[case(DatabaseErrorKind::ForeignKeyViolation, Some(ConstraintViolation::ForeignKey))]
    #[case(DatabaseErrorKind::CheckViolation, None)]
    fn classifies_integrity_violations(
        #[case] kind: DatabaseErrorKind,
        #[case] expected: Option<ConstraintViolation>,
    ) {
        let error = database_error(kind, "duplicate key violates bindings_spool_id_key");
        let classified = constraint_violation(&error);
        assert_eq!(classified.as_ref().map(|(v, _)| *v), expected);
        if let Some((_, name)) = classified {
            assert!(name.contains(SPOOL_UNIQUE_CONSTRAINT));
        }
    }

    #[rstest]
    fn not_found_is_not_a_violation() {
        assert!(constraint_violation(&DieselError::NotFound).is_none());
    }

    #[rstest]
    #[case(DieselError::NotFound, Mapped::Query("record not found"))]
    #[case(
        database_error(DatabaseErrorKind::ClosedConnection, "gone"),
        Mapped::Connection("database connection error")
    )]
    #[case(
        database_error(DatabaseErrorKind::SerializationFailure, "retry"),
        Mapped::Query("concurrent update detected")
    )]
    #[case(
        database_error(DatabaseErrorKind::CheckViolation, "bad"),
        Mapped::Query("database error")
    )]
    fn maps_basic_failures(#[case] error: DieselError, #[case] expected: Mapped) {
        assert_eq!(map(error), expected);
    }

    #[rstest]
    fn pool_errors_keep_their_message() {
        let mapped: String = map_basic_pool_error(PoolError::checkout("timed out"), |m| m);
        assert_eq!(mapped, "timed out");
    }
}
