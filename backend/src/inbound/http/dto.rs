//! Wire representations shared by HTTP responses and WebSocket events.
//!
//! Domain types stay free of serde and utoipa concerns; these DTOs fix the
//! camelCase JSON shape clients rely on.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::{DeviceStatus, StatusSnapshot};
use crate::domain::{
    Binding, Device, DeviceRuntimeView, PairingSessionView, PairingTarget, ReconciliationError,
    UsageEvent,
};

/// A spool mounted on a toolhead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindingBody {
    #[schema(example = "mk4")]
    pub device_id: String,
    #[schema(example = 0)]
    pub toolhead: u16,
    #[schema(example = 42)]
    pub spool_id: i64,
    #[schema(format = "date-time")]
    pub assigned_at: String,
}

impl From<&Binding> for BindingBody {
    fn from(binding: &Binding) -> Self {
        Self {
            device_id: binding.device_id.as_str().to_owned(),
            toolhead: binding.toolhead.value(),
            spool_id: binding.spool_id.value(),
            assigned_at: binding.assigned_at.to_rfc3339(),
        }
    }
}

/// Registered device. The credential is never echoed; only its presence is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBody {
    #[schema(example = "mk4")]
    pub id: String,
    #[schema(example = "Prusa MK4")]
    pub name: String,
    #[schema(example = "http://10.0.0.12")]
    pub address: Option<String>,
    pub has_credential: bool,
    #[schema(example = 1)]
    pub toolhead_count: u16,
    #[schema(example = "idle")]
    pub last_state: String,
}

impl From<&Device> for DeviceBody {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id().as_str().to_owned(),
            name: device.name().to_owned(),
            address: device.address().map(|url| url.as_str().to_owned()),
            has_credential: device.credential().is_some(),
            toolhead_count: device.toolhead_count(),
            last_state: device.last_state().as_str().to_owned(),
        }
    }
}

/// Runtime state of one monitored device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusBody {
    pub device_id: String,
    pub name: String,
    pub toolhead_count: u16,
    #[schema(example = "printing")]
    pub state: String,
    /// Absent for devices without a running monitor task.
    #[schema(example = "printing")]
    pub phase: Option<String>,
    pub job_label: Option<String>,
    pub retained_after_failure: bool,
}

impl From<&DeviceStatus> for DeviceStatusBody {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            device_id: status.device_id.as_str().to_owned(),
            name: status.name.clone(),
            toolhead_count: status.toolhead_count,
            state: status.state.as_str().to_owned(),
            phase: status.phase.map(|phase| phase.as_str().to_owned()),
            job_label: status.job_label.clone(),
            retained_after_failure: status.retained_after_failure,
        }
    }
}

/// Devices and bindings in one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub devices: Vec<DeviceStatusBody>,
    pub bindings: Vec<BindingBody>,
}

impl From<&StatusSnapshot> for StatusBody {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            devices: snapshot.devices.iter().map(DeviceStatusBody::from).collect(),
            bindings: snapshot.bindings.iter().map(BindingBody::from).collect(),
        }
    }
}

/// Monitor-side view pushed when a device changes phase or state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRuntimeBody {
    pub device_id: String,
    pub phase: String,
    pub state: String,
    pub job_label: Option<String>,
    pub retained_after_failure: bool,
}

impl From<&DeviceRuntimeView> for DeviceRuntimeBody {
    fn from(view: &DeviceRuntimeView) -> Self {
        Self {
            device_id: view.device_id.as_str().to_owned(),
            phase: view.phase.as_str().to_owned(),
            state: view.state.as_str().to_owned(),
            job_label: view.job_label.clone(),
            retained_after_failure: view.retained_after_failure,
        }
    }
}

/// Usage applied to a spool after a print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageEventBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub device_id: String,
    pub toolhead: u16,
    pub spool_id: i64,
    #[schema(example = 12.5)]
    pub grams: f64,
    pub job_label: String,
    #[schema(format = "date-time")]
    pub recorded_at: String,
}

impl From<&UsageEvent> for UsageEventBody {
    fn from(event: &UsageEvent) -> Self {
        Self {
            id: event.id.to_string(),
            device_id: event.device_id.as_str().to_owned(),
            toolhead: event.toolhead.value(),
            spool_id: event.spool_id.value(),
            grams: event.grams,
            job_label: event.job_label.clone(),
            recorded_at: event.recorded_at.to_rfc3339(),
        }
    }
}

/// A completion that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationErrorBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub device_id: String,
    pub job_label: Option<String>,
    #[schema(example = "download_failed")]
    pub kind: String,
    pub message: String,
    #[schema(format = "date-time")]
    pub occurred_at: String,
    pub acknowledged: bool,
}

impl From<&ReconciliationError> for ReconciliationErrorBody {
    fn from(error: &ReconciliationError) -> Self {
        Self {
            id: error.id.to_string(),
            device_id: error.device_id.as_str().to_owned(),
            job_label: error.job_label.clone(),
            kind: error.kind.as_str().to_owned(),
            message: error.message.clone(),
            occurred_at: error.occurred_at.to_rfc3339(),
            acknowledged: error.acknowledged,
        }
    }
}

/// Scanned target: either a toolhead or a named storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PairingTargetBody {
    #[serde(rename_all = "camelCase")]
    Toolhead { device_id: String, toolhead: u16 },
    #[serde(rename_all = "camelCase")]
    Location { name: String },
}

impl From<&PairingTarget> for PairingTargetBody {
    fn from(target: &PairingTarget) -> Self {
        match target {
            PairingTarget::Toolhead {
                device_id,
                toolhead,
            } => Self::Toolhead {
                device_id: device_id.as_str().to_owned(),
                toolhead: toolhead.value(),
            },
            PairingTarget::Location(name) => Self::Location {
                name: name.as_str().to_owned(),
            },
        }
    }
}

/// Half-complete pairing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairingSessionBody {
    pub session_key: String,
    pub spool_id: Option<i64>,
    pub target: Option<PairingTargetBody>,
    #[schema(format = "date-time")]
    pub created_at: String,
    #[schema(format = "date-time")]
    pub expires_at: String,
}

impl From<&PairingSessionView> for PairingSessionBody {
    fn from(view: &PairingSessionView) -> Self {
        Self {
            session_key: view.session_key.as_str().to_owned(),
            spool_id: view.spool_id.map(|id| id.value()),
            target: view.target.as_ref().map(PairingTargetBody::from),
            created_at: view.created_at.to_rfc3339(),
            expires_at: view.expires_at.to_rfc3339(),
        }
    }
}
