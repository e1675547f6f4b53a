//! Test utilities shared by unit tests (in `src/`) and integration tests (in
//! `tests/`).
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature. The
//! in-memory adapters honour the same contracts as the PostgreSQL and HTTP
//! adapters, including the binding uniqueness invariant, and expose knobs to
//! inject failures.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod clock;
mod inventory;
mod status_source;
mod stores;

pub use clock::{ImmediateSleeper, MutableClock, NoJitter, RecordingSleeper};
pub use inventory::InMemoryInventory;
pub use status_source::ScriptedStatusSource;
pub use stores::{
    InMemoryBindingStore, InMemoryDeviceRepository, InMemoryReconciliationErrors,
    InMemoryUsageLedger,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
