//! Two-scan pairing sessions.
//!
//! A client scans a spool tag and a target tag in either order. Scans from
//! the same client within the session TTL merge into one session; once both
//! halves are present the session is removed and the pairing is applied
//! through [`BindingCommand`], the same path manual assignments take.
//!
//! Toolhead targets are checked against the device registry before they
//! touch the session table, so an unknown device or an out-of-range
//! toolhead is rejected without disturbing a pending spool half.
//!
//! The session table lock is held only while merging. The binding call runs
//! after the completed session has already been removed, so a slow inventory
//! mirror never blocks other clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::ports::{AssignSpoolRequest, BindingCommand, DeviceQuery, PairingCommand};
use crate::domain::{Error, SpoolId, StatusEvent, StatusEvents};

mod session;

pub use session::{
    ClientIdentity, LocationName, PairingScan, PairingScanOutcome, PairingSession,
    PairingSessionView, PairingTarget, PairingValidationError, SessionKey,
};

enum ScanProgress {
    Pending(PairingSessionView),
    Ready(SpoolId, PairingTarget),
}

/// Pairing session manager.
pub struct PairingService {
    sessions: Mutex<HashMap<SessionKey, PairingSession>>,
    bindings: Arc<dyn BindingCommand>,
    devices: Arc<dyn DeviceQuery>,
    events: StatusEvents,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl PairingService {
    /// Create a manager whose sessions live for `ttl` from creation.
    pub fn new(
        bindings: Arc<dyn BindingCommand>,
        devices: Arc<dyn DeviceQuery>,
        events: StatusEvents,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            bindings,
            devices,
            events,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub fn sweep_expired(&self) -> Result<usize, Error> {
        let now = self.clock.utc();
        let mut sessions = self.lock_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }

    /// Sweep expired sessions every `interval` until `shutdown` flips.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => match self.sweep_expired() {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "swept expired pairing sessions"),
                    Err(error) => warn!(%error, "pairing sweep failed"),
                },
            }
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<SessionKey, PairingSession>>, Error> {
        self.sessions
            .lock()
            .map_err(|_| Error::internal("pairing session table poisoned"))
    }

    async fn check_target(&self, target: Option<&PairingTarget>) -> Result<(), Error> {
        let Some(PairingTarget::Toolhead {
            device_id,
            toolhead,
        }) = target
        else {
            return Ok(());
        };
        self.devices
            .get_device(device_id)
            .await?
            .check_toolhead(*toolhead)
            .map_err(|err| Error::invalid_request(err.to_string()))
    }

    fn merge_scan(&self, key: SessionKey, scan: PairingScan) -> Result<ScanProgress, Error> {
        let now = self.clock.utc();
        let mut sessions = self.lock_sessions()?;
        let live = sessions
            .get(&key)
            .is_some_and(|session| !session.is_expired(now));
        let session = if live {
            let session = sessions
                .get_mut(&key)
                .ok_or_else(|| Error::internal("pairing session vanished while locked"))?;
            session.merge(scan);
            session
        } else {
            sessions
                .entry(key.clone())
                .insert_entry(PairingSession::start(key.clone(), scan, now, self.ttl))
                .into_mut()
        };

        let progress = match session.completion() {
            Some((spool_id, target)) => ScanProgress::Ready(spool_id, target),
            None => ScanProgress::Pending(session.view()),
        };
        if matches!(progress, ScanProgress::Ready(..)) {
            sessions.remove(&key);
        }
        Ok(progress)
    }

    async fn complete(
        &self,
        spool_id: SpoolId,
        target: PairingTarget,
    ) -> Result<PairingScanOutcome, Error> {
        let applied = match &target {
            PairingTarget::Toolhead {
                device_id,
                toolhead,
            } => self
                .bindings
                .assign(AssignSpoolRequest {
                    device_id: device_id.clone(),
                    toolhead: *toolhead,
                    spool_id,
                })
                .await
                .map(drop),
            PairingTarget::Location(location) => self
                .bindings
                .store_at_location(spool_id, location)
                .await
                .map(drop),
        };

        match applied {
            Ok(()) => {
                info!(%spool_id, ?target, "pairing completed");
                self.events.publish(StatusEvent::PairingCompleted {
                    spool_id,
                    target: target.clone(),
                });
                Ok(PairingScanOutcome::Completed { spool_id, target })
            }
            Err(error) => {
                warn!(%spool_id, ?target, %error, "pairing rejected");
                self.events.publish(StatusEvent::PairingFailed {
                    spool_id,
                    message: error.message().to_owned(),
                });
                Err(error)
            }
        }
    }
}

#[async_trait]
impl PairingCommand for PairingService {
    async fn scan(
        &self,
        client: &ClientIdentity,
        scan: PairingScan,
    ) -> Result<PairingScanOutcome, Error> {
        if scan.is_empty() {
            return Err(Error::invalid_request(
                "scan must carry a spool or a target",
            ));
        }
        self.check_target(scan.target.as_ref()).await?;
        match self.merge_scan(SessionKey::derive(client), scan)? {
            ScanProgress::Pending(view) => {
                debug!(session = %view.session_key, "pairing session updated");
                self.events
                    .publish(StatusEvent::PairingUpdated(view.clone()));
                Ok(PairingScanOutcome::Pending(view))
            }
            ScanProgress::Ready(spool_id, target) => self.complete(spool_id, target).await,
        }
    }

    async fn session(&self, client: &ClientIdentity) -> Result<Option<PairingSessionView>, Error> {
        let key = SessionKey::derive(client);
        let now = self.clock.utc();
        let mut sessions = self.lock_sessions()?;
        let expired = sessions.get(&key).map(|session| session.is_expired(now));
        if expired == Some(true) {
            sessions.remove(&key);
            return Ok(None);
        }
        Ok(sessions.get(&key).map(PairingSession::view))
    }
}

#[cfg(test)]
mod tests;
