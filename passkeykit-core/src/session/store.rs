//! Two-tier persistence of session metadata.

use std::str::FromStr;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{SessionRecord, StoredSession};
use crate::broker::Credential;
use crate::config::{SessionOptions, SessionType};
use crate::error::PasskeyResult;
use crate::key::RawKey;
use crate::storage::KeyValueStore;

const ADDRESS_KEY: &str = "_address";
const CREDENTIAL_KEY: &str = "_credential";
const EXPIRES_KEY: &str = "_expires";
const SESSION_KEY: &str = "_session";
const SESSION_TYPE_KEY: &str = "_sessionType";
const PRIVATE_KEY_KEY: &str = "_privateKey";

const DURABLE_KEYS: [&str; 5] = [
    ADDRESS_KEY,
    CREDENTIAL_KEY,
    EXPIRES_KEY,
    SESSION_KEY,
    SESSION_TYPE_KEY,
];

/// A validated session read back from storage.
#[derive(Debug)]
pub struct LoadedSession {
    /// Public fields.
    pub record: SessionRecord,
    /// The cached key; present only for [`SessionType::Session`].
    pub key: Option<RawKey>,
}

/// Persists the current session across a durable and an ephemeral tier.
///
/// The durable tier holds address, credential id, expiry, session id and
/// session type. The ephemeral tier holds the hex encoded key, and only in
/// [`SessionType::Session`] mode. The key is never written to the durable tier.
#[derive(Clone)]
pub struct SessionStore {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Store using flat keys, for an application embedding the wallet directly.
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            ephemeral,
            namespace: String::new(),
        }
    }

    /// Store whose keys are namespaced by the SHA-256 of `origin`.
    ///
    /// Sessions of different requesting origins never collide in shared
    /// storage, and the origin itself is not readable from the key.
    #[must_use]
    pub fn for_origin(
        durable: Arc<dyn KeyValueStore>,
        ephemeral: Arc<dyn KeyValueStore>,
        origin: &str,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            namespace: origin_namespace(origin),
        }
    }

    /// Prefix applied to every storage key.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.namespace)
    }

    /// Starts a new session for `key`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if either tier rejects a write or the key is invalid.
    pub fn begin_session(
        &self,
        options: &SessionOptions,
        key: &RawKey,
        credential: &Credential,
        now: u64,
    ) -> PasskeyResult<SessionRecord> {
        let record = SessionRecord {
            session_id: new_session_id(),
            credential_id: credential.id_base64(),
            address: key.address()?,
            expires: now.saturating_add(options.session_timeout_ms),
            session_type: options.session_type,
        };

        self.ephemeral.remove_item(&self.key(PRIVATE_KEY_KEY))?;

        self.durable
            .set_item(&self.key(ADDRESS_KEY), &record.address.to_string())?;
        self.durable
            .set_item(&self.key(CREDENTIAL_KEY), &record.credential_id)?;
        self.durable
            .set_item(&self.key(EXPIRES_KEY), &record.expires.to_string())?;
        self.durable
            .set_item(&self.key(SESSION_KEY), &record.session_id)?;
        self.durable
            .set_item(&self.key(SESSION_TYPE_KEY), &record.session_type.to_string())?;

        if options.session_type == SessionType::Session {
            self.ephemeral
                .set_item(&self.key(PRIVATE_KEY_KEY), &key.to_hex())?;
        }

        log::info!(
            "session started for {} ({} mode)",
            record.address,
            record.session_type
        );
        Ok(record)
    }

    /// Reads the raw durable fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier cannot be read.
    pub fn read_stored(&self) -> PasskeyResult<StoredSession> {
        Ok(StoredSession {
            session_id: self.durable.get_item(&self.key(SESSION_KEY))?,
            credential_id: self.durable.get_item(&self.key(CREDENTIAL_KEY))?,
            address: self.durable.get_item(&self.key(ADDRESS_KEY))?,
            expires: self.durable.get_item(&self.key(EXPIRES_KEY))?,
            session_type: self.durable.get_item(&self.key(SESSION_TYPE_KEY))?,
        })
    }

    /// Mode recorded when the stored session was created, if parseable.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier cannot be read.
    pub fn stored_session_type(&self) -> PasskeyResult<Option<SessionType>> {
        Ok(self
            .durable
            .get_item(&self.key(SESSION_TYPE_KEY))?
            .and_then(|value| SessionType::from_str(&value).ok()))
    }

    /// Loads the session for `session_type`.
    ///
    /// Returns `None` if nothing is stored. Partial, corrupt or expired state,
    /// a session created in another mode, and a cached key that does not
    /// derive the stored address are all deleted from both tiers and reported
    /// as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if a storage tier fails.
    pub fn load(&self, session_type: SessionType, now: u64) -> PasskeyResult<Option<LoadedSession>> {
        let stored = self.read_stored()?;
        let cached_key = self.ephemeral.get_item(&self.key(PRIVATE_KEY_KEY))?;
        if stored.is_empty() && cached_key.is_none() {
            return Ok(None);
        }

        let record = match stored.validate(now) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("discarding stored session: {e}");
                self.clear()?;
                return Ok(None);
            }
        };

        if record.session_type != session_type {
            log::warn!(
                "discarding stored session: created in {} mode, requested {session_type}",
                record.session_type
            );
            self.clear()?;
            return Ok(None);
        }

        let key = match session_type {
            SessionType::Passkey => None,
            SessionType::Session => {
                let key = cached_key
                    .as_deref()
                    .map(RawKey::from_hex)
                    .and_then(Result::ok)
                    .filter(|key| key.address().is_ok_and(|address| address == record.address));
                if key.is_none() {
                    log::warn!("discarding stored session: cached key missing or mismatched");
                    self.clear()?;
                    return Ok(None);
                }
                key
            }
        };

        Ok(Some(LoadedSession { record, key }))
    }

    /// Erases every session key from both tiers. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier rejects a delete.
    pub fn clear(&self) -> PasskeyResult<()> {
        for name in DURABLE_KEYS {
            self.durable.remove_item(&self.key(name))?;
            self.ephemeral.remove_item(&self.key(name))?;
        }
        self.durable.remove_item(&self.key(PRIVATE_KEY_KEY))?;
        self.ephemeral.remove_item(&self.key(PRIVATE_KEY_KEY))?;
        Ok(())
    }
}

fn origin_namespace(origin: &str) -> String {
    hex::encode(Sha256::digest(origin.as_bytes()))
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
