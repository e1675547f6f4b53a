//! Scripted device status source.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::lock;
use crate::domain::ports::{DeviceStatusSource, DeviceStatusSourceError, MachineSnapshot};
use crate::domain::{Device, DeviceId, MachineState};

type StatusReply = Result<MachineSnapshot, DeviceStatusSourceError>;
type DownloadReply = Result<Vec<u8>, DeviceStatusSourceError>;

/// Replays queued poll results per device.
///
/// Once a device's queue is drained the last successful snapshot is repeated
/// (or `Idle` if none was scripted). Downloads consume queued failures before
/// serving the registered payload for a label.
#[derive(Default)]
pub struct ScriptedStatusSource {
    polls: Mutex<HashMap<DeviceId, VecDeque<StatusReply>>>,
    last: Mutex<HashMap<DeviceId, MachineSnapshot>>,
    downloads: Mutex<HashMap<String, VecDeque<DownloadReply>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    poll_count: AtomicUsize,
    download_count: AtomicUsize,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue snapshots for a device.
    pub fn script(&self, device_id: &DeviceId, snapshots: impl IntoIterator<Item = MachineSnapshot>) {
        lock(&self.polls)
            .entry(device_id.clone())
            .or_default()
            .extend(snapshots.into_iter().map(Ok));
    }

    /// Queue a failing poll for a device.
    pub fn fail_poll(&self, device_id: &DeviceId, error: DeviceStatusSourceError) {
        lock(&self.polls)
            .entry(device_id.clone())
            .or_default()
            .push_back(Err(error));
    }

    /// Serve `payload` for downloads of `label`.
    pub fn put_file(&self, label: &str, payload: impl Into<Vec<u8>>) {
        lock(&self.files).insert(label.to_owned(), payload.into());
    }

    /// Queue download failures for `label` ahead of its payload.
    pub fn fail_downloads(
        &self,
        label: &str,
        errors: impl IntoIterator<Item = DeviceStatusSourceError>,
    ) {
        lock(&self.downloads)
            .entry(label.to_owned())
            .or_default()
            .extend(errors.into_iter().map(Err));
    }

    /// Whether every scripted poll for the device has been consumed.
    pub fn drained(&self, device_id: &DeviceId) -> bool {
        lock(&self.polls)
            .get(device_id)
            .is_none_or(VecDeque::is_empty)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.download_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceStatusSource for ScriptedStatusSource {
    async fn machine_state(&self, device: &Device) -> StatusReply {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.polls)
            .get_mut(device.id())
            .and_then(VecDeque::pop_front);
        let mut last = lock(&self.last);
        match next {
            Some(Ok(snapshot)) => {
                last.insert(device.id().clone(), snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(error)) => Err(error),
            None => Ok(last
                .get(device.id())
                .cloned()
                .unwrap_or_else(|| MachineSnapshot::bare(MachineState::Idle))),
        }
    }

    async fn download_file(&self, _device: &Device, label: &str) -> DownloadReply {
        self.download_count.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = lock(&self.downloads)
            .get_mut(label)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        lock(&self.files)
            .get(label)
            .cloned()
            .ok_or_else(|| DeviceStatusSourceError::not_found(label))
    }
}
