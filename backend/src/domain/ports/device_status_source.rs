//! Driven port for polling printers.
//!
//! The monitor owns the polling cadence; adapters only translate one request
//! into the device's API and map failures into [`DeviceStatusSourceError`].

use async_trait::async_trait;

use crate::domain::{Device, MachineState};

use super::define_port_error;

/// One status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Reported machine state.
    pub state: MachineState,
    /// File currently loaded for printing, if the device reports one.
    pub active_file: Option<String>,
}

impl MachineSnapshot {
    /// Snapshot without an active file.
    #[must_use]
    pub const fn bare(state: MachineState) -> Self {
        Self {
            state,
            active_file: None,
        }
    }

    /// Snapshot with an active file.
    #[must_use]
    pub fn with_file(state: MachineState, file: impl Into<String>) -> Self {
        Self {
            state,
            active_file: Some(file.into()),
        }
    }
}

define_port_error! {
    /// Errors surfaced while talking to a device.
    pub enum DeviceStatusSourceError {
        /// Network transport failed before a response arrived.
        Transport { message: String } => "device transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } => "device request timed out: {message}",
        /// The device rejected the credential.
        Unauthorized { message: String } => "device rejected credentials: {message}",
        /// The requested file does not exist on the device.
        NotFound { message: String } => "device resource not found: {message}",
        /// The response could not be decoded.
        Decode { message: String } => "device response decode failed: {message}",
        /// The request could not be built (for example a placeholder device).
        InvalidRequest { message: String } => "device request invalid: {message}",
    }
}

impl DeviceStatusSourceError {
    /// Return whether retrying this error is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceStatusSource: Send + Sync {
    /// Current machine state and active file.
    async fn machine_state(&self, device: &Device)
    -> Result<MachineSnapshot, DeviceStatusSourceError>;

    /// Download a print file by the label the device reported.
    async fn download_file(
        &self,
        device: &Device,
        label: &str,
    ) -> Result<Vec<u8>, DeviceStatusSourceError>;
}

/// Fixture source reporting every device as idle.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceStatusSource;

#[async_trait]
impl DeviceStatusSource for FixtureDeviceStatusSource {
    async fn machine_state(
        &self,
        _device: &Device,
    ) -> Result<MachineSnapshot, DeviceStatusSourceError> {
        Ok(MachineSnapshot::bare(MachineState::Idle))
    }

    async fn download_file(
        &self,
        _device: &Device,
        label: &str,
    ) -> Result<Vec<u8>, DeviceStatusSourceError> {
        Err(DeviceStatusSourceError::not_found(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DeviceStatusSourceError::transport("reset"), true)]
    #[case(DeviceStatusSourceError::timeout("30s"), true)]
    #[case(DeviceStatusSourceError::unauthorized("401"), false)]
    #[case(DeviceStatusSourceError::not_found("a.gcode"), false)]
    #[case(DeviceStatusSourceError::decode("bad json"), false)]
    fn classifies_retryable_errors(#[case] error: DeviceStatusSourceError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }
}
