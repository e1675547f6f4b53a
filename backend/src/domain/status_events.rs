//! In-process broadcast of state changes for live dashboards.
//!
//! Publishing never blocks and never fails: events sent while nobody is
//! subscribed are dropped, and slow subscribers observe a lag instead of
//! back-pressuring the monitor.

use tokio::sync::broadcast;
use tracing::trace;

use super::monitor::DeviceRuntimeView;
use super::pairing::{PairingSessionView, PairingTarget};
use super::{Binding, DeviceId, ReconciliationError, SpoolId, ToolheadIndex, UsageEvent};

const DEFAULT_CAPACITY: usize = 256;

/// Event published after a state change.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// A spool was mounted on a toolhead.
    BindingChanged(Binding),
    /// A toolhead was cleared.
    BindingRemoved {
        /// Device carrying the toolhead.
        device_id: DeviceId,
        /// Cleared toolhead.
        toolhead: ToolheadIndex,
        /// Spool that was unmounted.
        spool_id: SpoolId,
    },
    /// A device's runtime state changed.
    DeviceRuntime(DeviceRuntimeView),
    /// A pairing session gained a field.
    PairingUpdated(PairingSessionView),
    /// A pairing session completed and its action was applied.
    PairingCompleted {
        /// Paired spool.
        spool_id: SpoolId,
        /// Where the spool went.
        target: PairingTarget,
    },
    /// A pairing session completed but its action was rejected.
    PairingFailed {
        /// Paired spool.
        spool_id: SpoolId,
        /// Rejection reason.
        message: String,
    },
    /// Usage was applied to a spool.
    UsageRecorded(UsageEvent),
    /// A completion could not be reconciled.
    ReconciliationFailed(ReconciliationError),
}

/// Cloneable handle to the status broadcast channel.
#[derive(Debug, Clone)]
pub struct StatusEvents {
    sender: broadcast::Sender<StatusEvent>,
}

impl Default for StatusEvents {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl StatusEvents {
    /// Create a channel retaining up to `capacity` undelivered events per
    /// subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to current subscribers.
    pub fn publish(&self, event: StatusEvent) {
        if self.sender.send(event).is_err() {
            trace!("status event dropped; no subscribers");
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}
