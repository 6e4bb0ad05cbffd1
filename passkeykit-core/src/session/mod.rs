//! Session records and their persistence.

mod store;

use std::str::FromStr;

use alloy_primitives::Address;
use serde::Serialize;

pub use store::{LoadedSession, SessionStore};

use crate::account::Account;
use crate::config::SessionType;
use crate::error::{PasskeyError, PasskeyResult};

/// Public fields of a session. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Opaque session token.
    pub session_id: String,
    /// Base64 credential identifier.
    pub credential_id: String,
    /// Wallet address.
    pub address: Address,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub expires: u64,
    /// Mode the session was created in.
    pub session_type: SessionType,
}

impl SessionRecord {
    /// A session is valid iff every field is present and `now < expires`.
    #[must_use]
    pub fn is_valid(&self, now: u64) -> bool {
        !self.session_id.is_empty() && !self.credential_id.is_empty() && now < self.expires
    }
}

/// Session fields exactly as read from storage; any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    /// `_session`
    pub session_id: Option<String>,
    /// `_credential`
    pub credential_id: Option<String>,
    /// `_address`
    pub address: Option<String>,
    /// `_expires`
    pub expires: Option<String>,
    /// `_sessionType`
    pub session_type: Option<String>,
}

impl StoredSession {
    /// `true` if no field is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.session_id.is_none()
            && self.credential_id.is_none()
            && self.address.is_none()
            && self.expires.is_none()
            && self.session_type.is_none()
    }

    /// Parses and validates the stored fields.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` if a field is missing or malformed, or if the
    /// session expired.
    pub fn validate(&self, now: u64) -> PasskeyResult<SessionRecord> {
        let (
            Some(session_id),
            Some(credential_id),
            Some(address),
            Some(expires),
            Some(session_type),
        ) = (
            &self.session_id,
            &self.credential_id,
            &self.address,
            &self.expires,
            &self.session_type,
        )
        else {
            return Err(PasskeyError::InvalidSession);
        };

        let record = SessionRecord {
            session_id: session_id.clone(),
            credential_id: credential_id.clone(),
            address: Address::from_str(address).map_err(|_| PasskeyError::InvalidSession)?,
            expires: expires.parse().map_err(|_| PasskeyError::InvalidSession)?,
            session_type: SessionType::from_str(session_type)
                .map_err(|_| PasskeyError::InvalidSession)?,
        };

        if !record.is_valid(now) {
            return Err(PasskeyError::InvalidSession);
        }
        Ok(record)
    }
}

/// The current session: its public record plus the signing capability.
#[derive(Debug)]
pub struct Session<A> {
    record: SessionRecord,
    account: Account<A>,
}

impl<A> Session<A> {
    pub(crate) const fn new(record: SessionRecord, account: Account<A>) -> Self {
        Self { record, account }
    }

    /// Public fields.
    #[must_use]
    pub const fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Signing capability bound to this session.
    #[must_use]
    pub const fn account(&self) -> &Account<A> {
        &self.account
    }

    /// Session token.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.record.session_id
    }

    /// Wallet address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.record.address
    }

    /// See [`SessionRecord::is_valid`].
    #[must_use]
    pub fn is_valid(&self, now: u64) -> bool {
        self.record.is_valid(now)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn complete() -> StoredSession {
        StoredSession {
            session_id: Some("0b6f7a8e-2d1c-4b7e-9a55-3a1f0c9d8e21".to_string()),
            credential_id: Some("AQID".to_string()),
            address: Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string()),
            expires: Some("2000".to_string()),
            session_type: Some("passkey".to_string()),
        }
    }

    #[test]
    fn test_complete_unexpired_session_is_valid() {
        let record = complete().validate(1999).unwrap();
        assert_eq!(record.expires, 2000);
        assert_eq!(record.session_type, SessionType::Passkey);
        assert!(record.is_valid(1999));
    }

    #[test_case(2000 ; "at expiry")]
    #[test_case(5000 ; "after expiry")]
    fn test_expired_session_is_invalid(now: u64) {
        assert!(matches!(complete().validate(now), Err(PasskeyError::InvalidSession)));
    }

    #[test_case(|s: &mut StoredSession| s.session_id = None ; "missing session id")]
    #[test_case(|s: &mut StoredSession| s.credential_id = None ; "missing credential")]
    #[test_case(|s: &mut StoredSession| s.address = None ; "missing address")]
    #[test_case(|s: &mut StoredSession| s.expires = None ; "missing expiry")]
    #[test_case(|s: &mut StoredSession| s.session_type = None ; "missing session type")]
    #[test_case(|s: &mut StoredSession| s.expires = Some("soon".to_string()) ; "malformed expiry")]
    #[test_case(|s: &mut StoredSession| s.address = Some("0x1234".to_string()) ; "malformed address")]
    #[test_case(|s: &mut StoredSession| s.session_id = Some(String::new()) ; "empty session id")]
    fn test_partial_or_corrupt_session_is_invalid(corrupt: fn(&mut StoredSession)) {
        let mut stored = complete();
        corrupt(&mut stored);
        assert!(matches!(stored.validate(0), Err(PasskeyError::InvalidSession)));
    }
}
