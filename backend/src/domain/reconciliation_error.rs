//! Dead-letter records for completions that could not be reconciled.
//!
//! Records are created once per failed completion, changed only by
//! acknowledgement, and never removed automatically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DeviceId;

/// Identifier of a reconciliation error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReconciliationErrorId(Uuid);

impl ReconciliationErrorId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ReconciliationErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReconciliationErrorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Stage at which reconciliation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconciliationErrorKind {
    /// The print file could not be fetched (or no file label was captured).
    DownloadFailed,
    /// The file was fetched but carried no usage marker.
    NoUsageData,
    /// Bound spools could not be resolved.
    BindingLookupFailed,
    /// The inventory rejected a read or write.
    InventoryUpdateFailed,
    /// The inventory was updated but the local usage ledger write failed.
    LedgerWriteFailed,
}

impl ReconciliationErrorKind {
    /// Stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DownloadFailed => "download_failed",
            Self::NoUsageData => "no_usage_data",
            Self::BindingLookupFailed => "binding_lookup_failed",
            Self::InventoryUpdateFailed => "inventory_update_failed",
            Self::LedgerWriteFailed => "ledger_write_failed",
        }
    }
}

impl fmt::Display for ReconciliationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download_failed" => Ok(Self::DownloadFailed),
            "no_usage_data" => Ok(Self::NoUsageData),
            "binding_lookup_failed" => Ok(Self::BindingLookupFailed),
            "inventory_update_failed" => Ok(Self::InventoryUpdateFailed),
            "ledger_write_failed" => Ok(Self::LedgerWriteFailed),
            other => Err(format!("unknown reconciliation error kind: {other}")),
        }
    }
}

/// A completion that needs human follow-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationError {
    /// Record identifier.
    pub id: ReconciliationErrorId,
    /// Device whose completion failed.
    pub device_id: DeviceId,
    /// File label of the print, if one was captured.
    pub job_label: Option<String>,
    /// Failure stage.
    pub kind: ReconciliationErrorKind,
    /// Operator-facing description.
    pub message: String,
    /// When the failure was recorded.
    pub occurred_at: DateTime<Utc>,
    /// Whether an operator has acknowledged the record.
    pub acknowledged: bool,
}
