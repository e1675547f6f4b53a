//! In-memory stand-in for the filament inventory service.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::lock;
use crate::domain::SpoolId;
use crate::domain::ports::{InventoryService, InventoryServiceError};

#[derive(Debug, Clone, Default)]
struct SpoolRecord {
    used_grams: f64,
    location: Option<String>,
}

/// Inventory keyed by spool with injectable failures.
#[derive(Default)]
pub struct InMemoryInventory {
    spools: Mutex<HashMap<SpoolId, SpoolRecord>>,
    locations: Mutex<BTreeSet<String>>,
    failing_spools: Mutex<HashSet<SpoolId>>,
    fail_location_writes: AtomicBool,
    usage_writes: AtomicUsize,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spool with existing usage.
    pub fn with_spool(self, spool_id: SpoolId, used_grams: f64) -> Self {
        lock(&self.spools).insert(
            spool_id,
            SpoolRecord {
                used_grams,
                location: None,
            },
        );
        self
    }

    /// Register a named storage location.
    pub fn with_location(self, name: &str) -> Self {
        lock(&self.locations).insert(name.to_owned());
        self
    }

    /// Make usage reads and writes for `spool_id` fail.
    pub fn fail_usage_for(&self, spool_id: SpoolId) {
        lock(&self.failing_spools).insert(spool_id);
    }

    /// Make location writes fail.
    pub fn fail_location_writes(&self, fail: bool) {
        self.fail_location_writes.store(fail, Ordering::SeqCst);
    }

    pub fn used_grams(&self, spool_id: SpoolId) -> Option<f64> {
        lock(&self.spools)
            .get(&spool_id)
            .map(|record| record.used_grams)
    }

    pub fn location(&self, spool_id: SpoolId) -> Option<String> {
        lock(&self.spools)
            .get(&spool_id)
            .and_then(|record| record.location.clone())
    }

    /// Number of successful usage writes.
    pub fn usage_writes(&self) -> usize {
        self.usage_writes.load(Ordering::SeqCst)
    }

    fn check_usage(&self, spool_id: SpoolId) -> Result<(), InventoryServiceError> {
        if lock(&self.failing_spools).contains(&spool_id) {
            return Err(InventoryServiceError::transport("injected failure"));
        }
        Ok(())
    }

    fn write_location(
        &self,
        spool_id: SpoolId,
        location: Option<&str>,
    ) -> Result<(), InventoryServiceError> {
        if self.fail_location_writes.load(Ordering::SeqCst) {
            return Err(InventoryServiceError::timeout("injected failure"));
        }
        let mut spools = lock(&self.spools);
        let record = spools
            .get_mut(&spool_id)
            .ok_or_else(|| InventoryServiceError::unknown_spool(spool_id))?;
        record.location = location.map(str::to_owned);
        Ok(())
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn spool_usage(&self, spool_id: SpoolId) -> Result<f64, InventoryServiceError> {
        self.check_usage(spool_id)?;
        self.used_grams(spool_id)
            .ok_or_else(|| InventoryServiceError::unknown_spool(spool_id))
    }

    async fn set_spool_usage(
        &self,
        spool_id: SpoolId,
        used_grams: f64,
    ) -> Result<(), InventoryServiceError> {
        self.check_usage(spool_id)?;
        let mut spools = lock(&self.spools);
        let record = spools
            .get_mut(&spool_id)
            .ok_or_else(|| InventoryServiceError::unknown_spool(spool_id))?;
        record.used_grams = used_grams;
        self.usage_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_spool_location(
        &self,
        spool_id: SpoolId,
        location: &str,
    ) -> Result<(), InventoryServiceError> {
        self.write_location(spool_id, Some(location))
    }

    async fn clear_spool_location(&self, spool_id: SpoolId) -> Result<(), InventoryServiceError> {
        self.write_location(spool_id, None)
    }

    async fn list_locations(&self) -> Result<Vec<String>, InventoryServiceError> {
        Ok(lock(&self.locations).iter().cloned().collect())
    }
}
