//! In-memory persistence adapters.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::lock;
use crate::domain::ports::{
    BindingStore, BindingStoreError, DeviceRepository, DeviceRepositoryError,
    ReconciliationErrorRepository, ReconciliationErrorRepositoryError, UsageLedger,
    UsageLedgerError,
};
use crate::domain::{
    BindOutcome, Binding, Device, DeviceId, MachineState, ReconciliationError,
    ReconciliationErrorId, SpoolId, ToolheadIndex, UsageEvent, UsageEventFilter,
};

/// Device table ordered by identifier.
#[derive(Default)]
pub struct InMemoryDeviceRepository {
    devices: Mutex<BTreeMap<DeviceId, Device>>,
}

impl InMemoryDeviceRepository {
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| (device.id().clone(), device))
            .collect();
        Self {
            devices: Mutex::new(devices),
        }
    }

    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        lock(&self.devices).get(id).cloned()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn list(&self) -> Result<Vec<Device>, DeviceRepositoryError> {
        Ok(lock(&self.devices).values().cloned().collect())
    }

    async fn find(&self, id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError> {
        Ok(self.get(id))
    }

    async fn insert(&self, device: &Device) -> Result<(), DeviceRepositoryError> {
        let mut devices = lock(&self.devices);
        if devices.contains_key(device.id()) {
            return Err(DeviceRepositoryError::duplicate(device.id().clone()));
        }
        devices.insert(device.id().clone(), device.clone());
        Ok(())
    }

    async fn update(&self, device: &Device) -> Result<bool, DeviceRepositoryError> {
        let mut devices = lock(&self.devices);
        match devices.get_mut(device.id()) {
            Some(existing) => {
                *existing = device.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &DeviceId) -> Result<bool, DeviceRepositoryError> {
        Ok(lock(&self.devices).remove(id).is_some())
    }

    async fn record_machine_state(
        &self,
        id: &DeviceId,
        state: MachineState,
    ) -> Result<(), DeviceRepositoryError> {
        let mut devices = lock(&self.devices);
        if let Some(device) = devices.remove(id) {
            devices.insert(id.clone(), device.with_last_state(state));
        }
        Ok(())
    }
}

/// Binding relation whose conflict check and write share one lock.
#[derive(Default)]
pub struct InMemoryBindingStore {
    rows: Mutex<Vec<Binding>>,
    offline: AtomicBool,
}

impl InMemoryBindingStore {
    pub fn new(bindings: impl IntoIterator<Item = Binding>) -> Self {
        Self {
            rows: Mutex::new(bindings.into_iter().collect()),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every call fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current rows ordered by device and toolhead.
    pub fn snapshot(&self) -> Vec<Binding> {
        let mut rows = lock(&self.rows).clone();
        rows.sort_by(|a, b| (&a.device_id, a.toolhead).cmp(&(&b.device_id, b.toolhead)));
        rows
    }

    fn check_online(&self) -> Result<(), BindingStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BindingStoreError::connection("store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BindingStore for InMemoryBindingStore {
    async fn bind(&self, binding: &Binding) -> Result<BindOutcome, BindingStoreError> {
        self.check_online()?;
        let mut rows = lock(&self.rows);
        if let Some(holder) = rows.iter().find(|row| {
            row.spool_id == binding.spool_id
                && !row.occupies(&binding.device_id, binding.toolhead)
        }) {
            return Err(BindingStoreError::conflict(
                holder.device_id.clone(),
                holder.toolhead,
                holder.spool_id,
            ));
        }
        let slot = rows
            .iter_mut()
            .find(|row| row.occupies(&binding.device_id, binding.toolhead));
        match slot {
            Some(row) if row.spool_id == binding.spool_id => Ok(BindOutcome::Unchanged),
            Some(row) => {
                let previous = row.spool_id;
                *row = binding.clone();
                Ok(BindOutcome::Replaced { previous })
            }
            None => {
                rows.push(binding.clone());
                Ok(BindOutcome::Created)
            }
        }
    }

    async fn unbind(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        self.check_online()?;
        let mut rows = lock(&self.rows);
        let position = rows.iter().position(|row| row.occupies(device_id, toolhead));
        Ok(position.map(|index| rows.remove(index).spool_id))
    }

    async fn unbind_spool(&self, spool_id: SpoolId) -> Result<Option<Binding>, BindingStoreError> {
        self.check_online()?;
        let mut rows = lock(&self.rows);
        let position = rows.iter().position(|row| row.spool_id == spool_id);
        Ok(position.map(|index| rows.remove(index)))
    }

    async fn lookup(
        &self,
        device_id: &DeviceId,
        toolhead: ToolheadIndex,
    ) -> Result<Option<SpoolId>, BindingStoreError> {
        self.check_online()?;
        Ok(lock(&self.rows)
            .iter()
            .find(|row| row.occupies(device_id, toolhead))
            .map(|row| row.spool_id))
    }

    async fn find_by_spool(
        &self,
        spool_id: SpoolId,
    ) -> Result<Option<Binding>, BindingStoreError> {
        self.check_online()?;
        Ok(lock(&self.rows)
            .iter()
            .find(|row| row.spool_id == spool_id)
            .cloned())
    }

    async fn all_bindings(&self) -> Result<Vec<Binding>, BindingStoreError> {
        self.check_online()?;
        Ok(self.snapshot())
    }
}

/// Append-only usage history.
#[derive(Default)]
pub struct InMemoryUsageLedger {
    events: Mutex<Vec<UsageEvent>>,
    fail_appends: AtomicBool,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Events in insertion order.
    pub fn events(&self) -> Vec<UsageEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn append(&self, event: &UsageEvent) -> Result<(), UsageLedgerError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(UsageLedgerError::query("injected failure"));
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }

    async fn list(&self, filter: &UsageEventFilter) -> Result<Vec<UsageEvent>, UsageLedgerError> {
        let events = lock(&self.events);
        Ok(events
            .iter()
            .rev()
            .filter(|event| {
                filter
                    .device_id
                    .as_ref()
                    .is_none_or(|device_id| &event.device_id == device_id)
            })
            .take(filter.limit)
            .cloned()
            .collect())
    }
}

/// Reconciliation dead-letter log.
#[derive(Default)]
pub struct InMemoryReconciliationErrors {
    records: Mutex<Vec<ReconciliationError>>,
    fail_records: AtomicBool,
}

impl InMemoryReconciliationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Records in insertion order.
    pub fn records(&self) -> Vec<ReconciliationError> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl ReconciliationErrorRepository for InMemoryReconciliationErrors {
    async fn record(
        &self,
        error: &ReconciliationError,
    ) -> Result<(), ReconciliationErrorRepositoryError> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(ReconciliationErrorRepositoryError::connection(
                "injected failure",
            ));
        }
        lock(&self.records).push(error.clone());
        Ok(())
    }

    async fn list(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<ReconciliationError>, ReconciliationErrorRepositoryError> {
        let records = lock(&self.records);
        Ok(records
            .iter()
            .rev()
            .filter(|record| include_acknowledged || !record.acknowledged)
            .cloned()
            .collect())
    }

    async fn acknowledge(
        &self,
        id: &ReconciliationErrorId,
    ) -> Result<bool, ReconciliationErrorRepositoryError> {
        let mut records = lock(&self.records);
        match records.iter_mut().find(|record| &record.id == id) {
            Some(record) => {
                record.acknowledged = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
