//! Shared WebSocket adapter state.
//!
//! The stream endpoint only reads from the status bus, so the state is the
//! bus handle plus the origin allow-list applied on upgrade.

use url::{Origin, Url};

use crate::domain::StatusEvents;

/// Dependency bundle for the WebSocket entry point and its sessions.
#[derive(Debug, Clone)]
pub struct WsState {
    pub events: StatusEvents,
    allowed_origins: Vec<Origin>,
}

impl WsState {
    /// Accept upgrades from any origin.
    pub fn new(events: StatusEvents) -> Self {
        Self {
            events,
            allowed_origins: Vec::new(),
        }
    }

    /// Restrict upgrades to the given origins. An empty list allows every
    /// origin.
    pub fn with_allowed_origins(mut self, origins: impl IntoIterator<Item = Url>) -> Self {
        self.allowed_origins = origins.into_iter().map(|url| url.origin()).collect();
        self
    }

    /// Whether any allow-list is configured.
    pub fn restricts_origins(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Returns true when `origin` may open a stream.
    pub fn allows(&self, origin: &Url) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let origin = origin.origin();
        origin.is_tuple() && self.allowed_origins.contains(&origin)
    }
}
