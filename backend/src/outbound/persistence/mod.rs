//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the storage ports backed by PostgreSQL via
//! `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories translate between Diesel rows and domain
//!   types and enforce nothing the database cannot. The spool uniqueness rule
//!   is a table constraint (`bindings_spool_id_key`); the adapter only turns
//!   its violation into a domain conflict.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: every Diesel or pool failure is mapped into
//!   the calling port's error enum.
//!
//! # Example
//!
//! ```no_run
//! use spoolkeeper::outbound::persistence::{DbPool, DieselBindingStore, PoolConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/spoolkeeper")).await?;
//! let bindings = DieselBindingStore::new(pool);
//! # drop(bindings);
//! # Ok(())
//! # }
//! ```

mod diesel_basic_error_mapping;
mod diesel_binding_store;
mod diesel_device_repository;
mod diesel_reconciliation_error_repository;
mod diesel_usage_ledger;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_binding_store::DieselBindingStore;
pub use diesel_device_repository::DieselDeviceRepository;
pub use diesel_reconciliation_error_repository::DieselReconciliationErrorRepository;
pub use diesel_usage_ledger::DieselUsageLedger;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
