//! Printer devices and their toolheads.
//!
//! A device is a network-reachable printer with a declared number of
//! toolheads. Devices without an address are placeholders: they can carry
//! bindings but are never polled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroize;

/// Upper bound on declared toolheads per device.
pub const MAX_TOOLHEADS: u16 = 16;

const DEVICE_ID_MAX: usize = 64;
const DEVICE_NAME_MAX: usize = 64;

/// Validation errors raised when constructing devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceValidationError {
    /// Identifier is empty.
    EmptyId,
    /// Identifier exceeds the maximum length.
    IdTooLong { max: usize },
    /// Identifier contains characters outside `[a-z0-9_-]`.
    InvalidIdCharacters,
    /// Display name is empty once trimmed.
    EmptyName,
    /// Display name exceeds the maximum length.
    NameTooLong { max: usize },
    /// Address is not an absolute `http`/`https` URL.
    InvalidAddress { reason: String },
    /// Toolhead count is outside `1..=MAX_TOOLHEADS`.
    ToolheadCountOutOfRange { count: u16 },
    /// Toolhead index is not declared on the device.
    ToolheadOutOfRange { index: ToolheadIndex, count: u16 },
}

impl fmt::Display for DeviceValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "device id must not be empty"),
            Self::IdTooLong { max } => write!(f, "device id must be at most {max} characters"),
            Self::InvalidIdCharacters => write!(
                f,
                "device id may only contain lowercase letters, digits, '-' and '_'"
            ),
            Self::EmptyName => write!(f, "device name must not be empty"),
            Self::NameTooLong { max } => {
                write!(f, "device name must be at most {max} characters")
            }
            Self::InvalidAddress { reason } => write!(f, "device address is invalid: {reason}"),
            Self::ToolheadCountOutOfRange { count } => write!(
                f,
                "toolhead count must be between 1 and {MAX_TOOLHEADS}, got {count}"
            ),
            Self::ToolheadOutOfRange { index, count } => write!(
                f,
                "toolhead {index} is out of range for a device with {count} toolhead(s)"
            ),
        }
    }
}

impl std::error::Error for DeviceValidationError {}

/// Stable operator-chosen device identifier (a slug).
///
/// # Examples
/// ```
/// use spoolkeeper::domain::DeviceId;
///
/// let id = DeviceId::new("voron-24").expect("valid slug");
/// assert_eq!(id.as_str(), "voron-24");
/// assert!(DeviceId::new("Voron 2.4").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and construct a device identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, DeviceValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DeviceValidationError::EmptyId);
        }
        if id.chars().count() > DEVICE_ID_MAX {
            return Err(DeviceValidationError::IdTooLong { max: DEVICE_ID_MAX });
        }
        let valid = id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(DeviceValidationError::InvalidIdCharacters);
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DeviceValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

impl FromStr for DeviceId {
    type Err = DeviceValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Zero-based toolhead position on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolheadIndex(u16);

impl ToolheadIndex {
    /// Wrap a raw zero-based index. Range checks happen against a device.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Raw zero-based value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ToolheadIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Machine state reported by a device status source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MachineState {
    /// Ready and not printing.
    Idle,
    /// Actively printing a file.
    Printing,
    /// Print paused; the job is still open.
    Paused,
    /// Last print completed.
    Finished,
    /// Last print was cancelled.
    Cancelled,
    /// Device reported an error.
    Error,
    /// Device could not be reached or has not reported yet.
    Offline,
    /// Placeholder device without an address.
    #[default]
    Unconfigured,
}

impl MachineState {
    /// Stable lowercase label used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Unconfigured => "unconfigured",
        }
    }

    /// States that close a print successfully when reached from `Printing`.
    #[must_use]
    pub const fn ends_print(self) -> bool {
        matches!(self, Self::Idle | Self::Finished)
    }

    /// States that abandon a print when reached from `Printing`.
    #[must_use]
    pub const fn aborts_print(self) -> bool {
        matches!(self, Self::Cancelled | Self::Error)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown machine state label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMachineState(pub String);

impl fmt::Display for UnknownMachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown machine state: {}", self.0)
    }
}

impl std::error::Error for UnknownMachineState {}

impl FromStr for MachineState {
    type Err = UnknownMachineState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "printing" => Ok(Self::Printing),
            "paused" => Ok(Self::Paused),
            "finished" => Ok(Self::Finished),
            "cancelled" => Ok(Self::Cancelled),
            "error" => Ok(Self::Error),
            "offline" => Ok(Self::Offline),
            "unconfigured" => Ok(Self::Unconfigured),
            other => Err(UnknownMachineState(other.to_owned())),
        }
    }
}

/// API credential presented to a device. Wiped from memory on drop and never
/// printed.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredential(String);

impl DeviceCredential {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for transport adapters.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceCredential(***)")
    }
}

impl Drop for DeviceCredential {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Unvalidated input used to create or update a device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceDraft {
    /// Requested identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional base URL of the device API.
    pub address: Option<String>,
    /// Optional API credential.
    pub credential: Option<String>,
    /// Number of toolheads the device carries.
    pub toolhead_count: u16,
}

/// Validated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    id: DeviceId,
    name: String,
    address: Option<Url>,
    credential: Option<DeviceCredential>,
    toolhead_count: u16,
    last_state: MachineState,
}

impl Device {
    /// Validate a draft into a device.
    ///
    /// Blank addresses and credentials are treated as absent.
    ///
    /// # Examples
    /// ```
    /// use spoolkeeper::domain::{Device, DeviceDraft, MachineState};
    ///
    /// let device = Device::new(DeviceDraft {
    ///     id: "mk4".into(),
    ///     name: "Prusa MK4".into(),
    ///     address: Some("http://10.0.0.12".into()),
    ///     credential: None,
    ///     toolhead_count: 1,
    /// })
    /// .expect("valid device");
    /// assert!(device.is_configured());
    /// assert_eq!(device.last_state(), MachineState::Offline);
    /// ```
    pub fn new(draft: DeviceDraft) -> Result<Self, DeviceValidationError> {
        let DeviceDraft {
            id,
            name,
            address,
            credential,
            toolhead_count,
        } = draft;

        let id = DeviceId::new(id)?;
        let name = validate_name(name)?;
        let address = address
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_address(raw.trim()))
            .transpose()?;
        if !(1..=MAX_TOOLHEADS).contains(&toolhead_count) {
            return Err(DeviceValidationError::ToolheadCountOutOfRange {
                count: toolhead_count,
            });
        }
        let credential = credential
            .filter(|secret| !secret.trim().is_empty())
            .map(DeviceCredential::new);
        let last_state = if address.is_some() {
            MachineState::Offline
        } else {
            MachineState::Unconfigured
        };

        Ok(Self {
            id,
            name,
            address,
            credential,
            toolhead_count,
            last_state,
        })
    }

    /// Replace the last-known machine state (used when loading from storage).
    #[must_use]
    pub fn with_last_state(mut self, state: MachineState) -> Self {
        self.last_state = if self.address.is_some() {
            state
        } else {
            MachineState::Unconfigured
        };
        self
    }

    /// Device identifier.
    #[must_use]
    pub const fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Base URL of the device API, if configured.
    #[must_use]
    pub const fn address(&self) -> Option<&Url> {
        self.address.as_ref()
    }

    /// Credential presented to the device API.
    #[must_use]
    pub const fn credential(&self) -> Option<&DeviceCredential> {
        self.credential.as_ref()
    }

    /// Declared toolhead count.
    #[must_use]
    pub const fn toolhead_count(&self) -> u16 {
        self.toolhead_count
    }

    /// Last machine state recorded for the device.
    #[must_use]
    pub const fn last_state(&self) -> MachineState {
        self.last_state
    }

    /// Whether the device has an address and can be polled.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.address.is_some()
    }

    /// Check that `index` is a declared toolhead.
    pub fn check_toolhead(&self, index: ToolheadIndex) -> Result<(), DeviceValidationError> {
        if index.value() < self.toolhead_count {
            Ok(())
        } else {
            Err(DeviceValidationError::ToolheadOutOfRange {
                index,
                count: self.toolhead_count,
            })
        }
    }

    /// Human-readable location label for a toolhead, mirrored to the
    /// inventory when a spool is mounted.
    #[must_use]
    pub fn toolhead_location(&self, index: ToolheadIndex) -> String {
        format!("{} T{}", self.name, index)
    }
}

fn validate_name(name: String) -> Result<String, DeviceValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DeviceValidationError::EmptyName);
    }
    if trimmed.chars().count() > DEVICE_NAME_MAX {
        return Err(DeviceValidationError::NameTooLong {
            max: DEVICE_NAME_MAX,
        });
    }
    Ok(trimmed.to_owned())
}

fn parse_address(raw: &str) -> Result<Url, DeviceValidationError> {
    let url = Url::parse(raw).map_err(|error| DeviceValidationError::InvalidAddress {
        reason: error.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeviceValidationError::InvalidAddress {
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(DeviceValidationError::InvalidAddress {
            reason: "missing host".to_owned(),
        });
    }
    Ok(url)
}
