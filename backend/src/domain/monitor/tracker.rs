//! Per-device print-completion state machine.
//!
//! The tracker turns a stream of polled machine states into single
//! completion edges. It is a plain value owned by one device task; nothing
//! else mutates it.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::ports::MachineSnapshot;
use crate::domain::{DeviceId, MachineState, ToolheadIndex};

/// Coarse monitor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorPhase {
    /// No print is open, or the device is unreachable.
    IdleOrOffline,
    /// A print is running or paused.
    Printing,
    /// A completion is being downloaded and reconciled.
    Completing,
}

impl MonitorPhase {
    /// Stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdleOrOffline => "idle_or_offline",
            Self::Printing => "printing",
            Self::Completing => "completing",
        }
    }
}

/// Read-only projection of a device's runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRuntimeView {
    /// Monitored device.
    pub device_id: DeviceId,
    /// Current phase.
    pub phase: MonitorPhase,
    /// Last machine state, `Offline` while polls fail.
    pub state: MachineState,
    /// Label of the tracked or retained print.
    pub job_label: Option<String>,
    /// Whether the label was kept after a failed completion.
    pub retained_after_failure: bool,
}

/// What one observation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Nothing worth reporting.
    Unchanged,
    /// A new print's file label was stored.
    LabelCaptured(String),
    /// A print just finished; completion handling must run.
    Completed {
        /// Stored label, absent when the device never reported a file.
        job_label: Option<String>,
    },
    /// A print was cancelled or failed on the device.
    Abandoned {
        /// Label that was dropped.
        job_label: Option<String>,
    },
}

/// Rejections for operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommandError {
    /// A completion is already in flight.
    Busy,
    /// No label is retained after a failure.
    NothingRetained,
}

impl fmt::Display for TrackerCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "a completion is already in progress"),
            Self::NothingRetained => write!(f, "no failed completion is waiting for action"),
        }
    }
}

impl std::error::Error for TrackerCommandError {}

/// Print-completion state machine for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTracker {
    last_state: Option<MachineState>,
    job_label: Option<String>,
    completing: bool,
    retained_after_failure: bool,
    applied: BTreeSet<ToolheadIndex>,
}

const fn in_print(state: MachineState) -> bool {
    matches!(state, MachineState::Printing | MachineState::Paused)
}

impl DeviceTracker {
    /// Fresh tracker with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll result.
    ///
    /// # Examples
    /// ```
    /// use spoolkeeper::domain::ports::MachineSnapshot;
    /// use spoolkeeper::domain::{DeviceTracker, MachineState, TrackerEvent};
    ///
    /// let mut tracker = DeviceTracker::new();
    /// tracker.observe(&MachineSnapshot::with_file(MachineState::Printing, "cube.gcode"));
    /// let event = tracker.observe(&MachineSnapshot::bare(MachineState::Idle));
    /// assert_eq!(
    ///     event,
    ///     TrackerEvent::Completed { job_label: Some("cube.gcode".into()) }
    /// );
    /// ```
    pub fn observe(&mut self, snapshot: &MachineSnapshot) -> TrackerEvent {
        let previous = self.last_state.replace(snapshot.state);
        let was_in_print = previous.is_some_and(in_print);

        if self.completing {
            return TrackerEvent::Unchanged;
        }

        if was_in_print && snapshot.state.ends_print() {
            self.completing = true;
            return TrackerEvent::Completed {
                job_label: self.job_label.clone(),
            };
        }

        if was_in_print && snapshot.state.aborts_print() {
            self.retained_after_failure = false;
            self.applied.clear();
            return TrackerEvent::Abandoned {
                job_label: self.job_label.take(),
            };
        }

        if snapshot.state == MachineState::Printing && self.job_label.is_none() {
            if let Some(file) = snapshot.active_file.as_deref().filter(|f| !f.is_empty()) {
                self.job_label = Some(file.to_owned());
                return TrackerEvent::LabelCaptured(file.to_owned());
            }
        }

        TrackerEvent::Unchanged
    }

    /// Record the result of a completion started by [`Self::observe`] or
    /// [`Self::retry`].
    ///
    /// The label is cleared only on success. After a failure the label is
    /// retained together with the toolheads already applied, so a retry does
    /// not deduct them twice.
    pub fn finish_completion(
        &mut self,
        succeeded: bool,
        applied: impl IntoIterator<Item = ToolheadIndex>,
    ) {
        self.completing = false;
        if succeeded {
            self.job_label = None;
            self.retained_after_failure = false;
            self.applied.clear();
        } else {
            self.applied.extend(applied);
            self.retained_after_failure = self.job_label.is_some();
        }
    }

    /// Start another completion for the retained label.
    pub fn retry(&mut self) -> Result<String, TrackerCommandError> {
        if self.completing {
            return Err(TrackerCommandError::Busy);
        }
        let label = self
            .retained_label()
            .ok_or(TrackerCommandError::NothingRetained)?
            .to_owned();
        self.completing = true;
        Ok(label)
    }

    /// Drop the retained label without applying usage.
    pub fn abandon(&mut self) -> Result<String, TrackerCommandError> {
        if self.completing {
            return Err(TrackerCommandError::Busy);
        }
        let label = self
            .retained_label()
            .ok_or(TrackerCommandError::NothingRetained)?
            .to_owned();
        self.job_label = None;
        self.retained_after_failure = false;
        self.applied.clear();
        Ok(label)
    }

    fn retained_label(&self) -> Option<&str> {
        self.job_label
            .as_deref()
            .filter(|_| self.retained_after_failure)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        if self.completing {
            MonitorPhase::Completing
        } else if self.last_state.is_some_and(in_print) {
            MonitorPhase::Printing
        } else {
            MonitorPhase::IdleOrOffline
        }
    }

    /// Last observed machine state.
    #[must_use]
    pub const fn last_state(&self) -> Option<MachineState> {
        self.last_state
    }

    /// Stored label.
    #[must_use]
    pub fn job_label(&self) -> Option<&str> {
        self.job_label.as_deref()
    }

    /// Whether the stored label survived a failed completion.
    #[must_use]
    pub const fn retained_after_failure(&self) -> bool {
        self.retained_after_failure
    }

    /// Toolheads already applied for the stored label.
    #[must_use]
    pub const fn applied(&self) -> &BTreeSet<ToolheadIndex> {
        &self.applied
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
