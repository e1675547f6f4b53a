//! Toolhead-to-spool bindings.
//!
//! A binding mounts one inventory spool on one device toolhead. The store
//! keeps the pair `(device, toolhead)` unique and each spool in at most one
//! binding.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeviceId, ToolheadIndex};

/// Identifier of a spool in the external inventory.
///
/// # Examples
/// ```
/// use spoolkeeper::domain::SpoolId;
///
/// assert_eq!(SpoolId::new(12).map(SpoolId::value), Ok(12));
/// assert!(SpoolId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SpoolId(i64);

/// Raised when a spool identifier is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolIdError {
    /// Value is zero or negative.
    NotPositive(i64),
    /// Value is not an integer.
    NotNumeric(String),
}

impl fmt::Display for SpoolIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive(value) => write!(f, "spool id must be positive, got {value}"),
            Self::NotNumeric(value) => write!(f, "spool id must be an integer, got '{value}'"),
        }
    }
}

impl std::error::Error for SpoolIdError {}

impl SpoolId {
    /// Validate and wrap a spool identifier.
    pub const fn new(value: i64) -> Result<Self, SpoolIdError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(SpoolIdError::NotPositive(value))
        }
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SpoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SpoolId {
    type Error = SpoolIdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpoolId> for i64 {
    fn from(value: SpoolId) -> Self {
        value.0
    }
}

impl FromStr for SpoolId {
    type Err = SpoolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| SpoolIdError::NotNumeric(trimmed.to_owned()))?;
        Self::new(value)
    }
}

/// A spool mounted on a device toolhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Device carrying the toolhead.
    pub device_id: DeviceId,
    /// Zero-based toolhead index.
    pub toolhead: ToolheadIndex,
    /// Mounted spool.
    pub spool_id: SpoolId,
    /// When the spool was assigned.
    pub assigned_at: DateTime<Utc>,
}

impl Binding {
    /// Whether this binding occupies the given slot.
    #[must_use]
    pub fn occupies(&self, device_id: &DeviceId, toolhead: ToolheadIndex) -> bool {
        &self.device_id == device_id && self.toolhead == toolhead
    }
}

/// Result of a bind operation that did not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The slot was empty.
    Created,
    /// A different spool occupied the slot and was released.
    Replaced {
        /// Spool that was previously mounted.
        previous: SpoolId,
    },
    /// The same spool was already mounted on the slot.
    Unchanged,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for spool identifiers.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Ok(42))]
    #[case(" 7 ", Ok(7))]
    #[case("0", Err(SpoolIdError::NotPositive(0)))]
    #[case("spool", Err(SpoolIdError::NotNumeric("spool".to_owned())))]
    fn parses_spool_ids(#[case] raw: &str, #[case] expected: Result<i64, SpoolIdError>) {
        assert_eq!(raw.parse::<SpoolId>().map(SpoolId::value), expected);
    }

    #[rstest]
    fn serde_rejects_non_positive_ids() {
        assert!(serde_json::from_str::<SpoolId>("-3").is_err());
        assert_eq!(
            serde_json::from_str::<SpoolId>("3").map(SpoolId::value).ok(),
            Some(3)
        );
    }
}
