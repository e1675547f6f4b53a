//! Wire-level message definitions for the WebSocket adapter.
//!
//! Domain status events are transformed into these payloads before being
//! serialized to JSON and sent to connected clients. Every frame carries a
//! snake_case `type` tag; the remaining fields reuse the REST DTOs so the
//! dashboard parses one shape per concept.

use serde::{Deserialize, Serialize};

use crate::domain::StatusEvent;
use crate::inbound::http::dto::{
    BindingBody, DeviceRuntimeBody, PairingSessionBody, PairingTargetBody,
    ReconciliationErrorBody, UsageEventBody,
};

/// Outbound status frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusMessage {
    BindingChanged {
        binding: BindingBody,
    },
    #[serde(rename_all = "camelCase")]
    BindingRemoved {
        device_id: String,
        toolhead: u16,
        spool_id: i64,
    },
    DeviceState {
        device: DeviceRuntimeBody,
    },
    PairingUpdated {
        session: PairingSessionBody,
    },
    #[serde(rename_all = "camelCase")]
    PairingCompleted {
        spool_id: i64,
        target: PairingTargetBody,
    },
    #[serde(rename_all = "camelCase")]
    PairingFailed {
        spool_id: i64,
        message: String,
    },
    UsageRecorded {
        usage: UsageEventBody,
    },
    ReconciliationFailed {
        error: ReconciliationErrorBody,
    },
    /// The connection fell behind and `skipped` events were dropped. Clients
    /// should refetch `/api/v1/status`.
    Lagged {
        skipped: u64,
    },
}

impl From<&StatusEvent> for StatusMessage {
    fn from(event: &StatusEvent) -> Self {
        match event {
            StatusEvent::BindingChanged(binding) => Self::BindingChanged {
                binding: BindingBody::from(binding),
            },
            StatusEvent::BindingRemoved {
                device_id,
                toolhead,
                spool_id,
            } => Self::BindingRemoved {
                device_id: device_id.as_str().to_owned(),
                toolhead: toolhead.value(),
                spool_id: spool_id.value(),
            },
            StatusEvent::DeviceRuntime(view) => Self::DeviceState {
                device: DeviceRuntimeBody::from(view),
            },
            StatusEvent::PairingUpdated(view) => Self::PairingUpdated {
                session: PairingSessionBody::from(view),
            },
            StatusEvent::PairingCompleted { spool_id, target } => Self::PairingCompleted {
                spool_id: spool_id.value(),
                target: PairingTargetBody::from(target),
            },
            StatusEvent::PairingFailed { spool_id, message } => Self::PairingFailed {
                spool_id: spool_id.value(),
                message: message.clone(),
            },
            StatusEvent::UsageRecorded(usage) => Self::UsageRecorded {
                usage: UsageEventBody::from(usage),
            },
            StatusEvent::ReconciliationFailed(error) => Self::ReconciliationFailed {
                error: ReconciliationErrorBody::from(error),
            },
        }
    }
}
