//! Driving port for two-scan pairing.

use async_trait::async_trait;

use crate::domain::{ClientIdentity, Error, PairingScan, PairingScanOutcome, PairingSessionView};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairingCommand: Send + Sync {
    /// Merge one scan into the client's session and complete it when both
    /// halves are present.
    async fn scan(
        &self,
        client: &ClientIdentity,
        scan: PairingScan,
    ) -> Result<PairingScanOutcome, Error>;

    /// The client's live session, if any.
    async fn session(&self, client: &ClientIdentity) -> Result<Option<PairingSessionView>, Error>;
}

/// Fixture pairing port that never holds a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePairingCommand;

#[async_trait]
impl PairingCommand for FixturePairingCommand {
    async fn scan(
        &self,
        _client: &ClientIdentity,
        _scan: PairingScan,
    ) -> Result<PairingScanOutcome, Error> {
        Err(Error::service_unavailable("pairing is not available"))
    }

    async fn session(
        &self,
        _client: &ClientIdentity,
    ) -> Result<Option<PairingSessionView>, Error> {
        Ok(None)
    }
}
