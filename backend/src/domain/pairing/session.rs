//! Pairing session values.
//!
//! A session accumulates the two halves of a physical pairing gesture: a
//! spool scan and a target scan. Either may arrive first.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};

use crate::domain::{DeviceId, SpoolId, ToolheadIndex};

const SESSION_KEY_BYTES: usize = 8;
const LOCATION_NAME_MAX: usize = 128;

/// Validation errors raised by pairing inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingValidationError {
    /// The scanning client could not be identified.
    EmptyClientIdentity,
    /// Location name is empty once trimmed.
    EmptyLocation,
    /// Location name exceeds the maximum length.
    LocationTooLong { max: usize },
}

impl fmt::Display for PairingValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyClientIdentity => write!(f, "scanning client identity must not be empty"),
            Self::EmptyLocation => write!(f, "location name must not be empty"),
            Self::LocationTooLong { max } => {
                write!(f, "location name must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for PairingValidationError {}

/// Network identity of a scanning client, such as its remote address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wrap a non-blank identity.
    pub fn new(identity: impl Into<String>) -> Result<Self, PairingValidationError> {
        let identity = identity.into();
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return Err(PairingValidationError::EmptyClientIdentity);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the identity.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Opaque session key derived from a client identity.
///
/// # Examples
/// ```
/// use spoolkeeper::domain::{ClientIdentity, SessionKey};
///
/// let client = ClientIdentity::new("10.0.0.7").expect("identity");
/// let key = SessionKey::derive(&client);
/// assert_eq!(key, SessionKey::derive(&client));
/// assert_eq!(key.as_str().len(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Hash the identity so raw client addresses never leave the service.
    #[must_use]
    pub fn derive(client: &ClientIdentity) -> Self {
        let digest = Sha256::digest(client.as_str().as_bytes());
        let prefix: Vec<u8> = digest.iter().take(SESSION_KEY_BYTES).copied().collect();
        Self(hex::encode(prefix))
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named storage location in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationName(String);

impl LocationName {
    /// Validate a location name.
    pub fn new(name: impl Into<String>) -> Result<Self, PairingValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PairingValidationError::EmptyLocation);
        }
        if trimmed.chars().count() > LOCATION_NAME_MAX {
            return Err(PairingValidationError::LocationTooLong {
                max: LOCATION_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a paired spool goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingTarget {
    /// Mount on a device toolhead.
    Toolhead {
        /// Target device.
        device_id: DeviceId,
        /// Target toolhead.
        toolhead: ToolheadIndex,
    },
    /// Put away in a named storage location.
    Location(LocationName),
}

/// One scan event. Absent fields leave the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PairingScan {
    /// Spool tag, if this scan read one.
    pub spool_id: Option<SpoolId>,
    /// Target tag, if this scan read one.
    pub target: Option<PairingTarget>,
}

impl PairingScan {
    /// Whether the scan carries nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.spool_id.is_none() && self.target.is_none()
    }
}

/// Read-only projection of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSessionView {
    /// Session key.
    pub session_key: SessionKey,
    /// Spool half, if scanned.
    pub spool_id: Option<SpoolId>,
    /// Target half, if scanned.
    pub target: Option<PairingTarget>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session stops being live.
    pub expires_at: DateTime<Utc>,
}

/// Result of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingScanOutcome {
    /// One half is still missing.
    Pending(PairingSessionView),
    /// Both halves were present and the action was applied.
    Completed {
        /// Paired spool.
        spool_id: SpoolId,
        /// Where it went.
        target: PairingTarget,
    },
}

/// Live accumulator for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    key: SessionKey,
    spool_id: Option<SpoolId>,
    target: Option<PairingTarget>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PairingSession {
    /// Open a session holding only the fields present in `scan`.
    ///
    /// The expiry is fixed here; later merges do not extend it.
    #[must_use]
    pub fn start(key: SessionKey, scan: PairingScan, now: DateTime<Utc>, ttl: TimeDelta) -> Self {
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            key,
            spool_id: scan.spool_id,
            target: scan.target,
            created_at: now,
            expires_at,
        }
    }

    /// Merge a scan; only present values overwrite.
    pub fn merge(&mut self, scan: PairingScan) {
        if let Some(spool_id) = scan.spool_id {
            self.spool_id = Some(spool_id);
        }
        if let Some(target) = scan.target {
            self.target = Some(target);
        }
    }

    /// Whether the session is no longer live at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Both halves, once present.
    #[must_use]
    pub fn completion(&self) -> Option<(SpoolId, PairingTarget)> {
        Some((self.spool_id?, self.target.clone()?))
    }

    /// Session key.
    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Read-only projection.
    #[must_use]
    pub fn view(&self) -> PairingSessionView {
        PairingSessionView {
            session_key: self.key.clone(),
            spool_id: self.spool_id,
            target: self.target.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
