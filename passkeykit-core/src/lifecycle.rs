//! Session lifecycle state machine.
//!
//! ```text
//!   Anonymous ──register──▶ Anonymous (credential created, no key yet)
//!   Anonymous ──generate_wallet / login──▶ Active
//!   Active ──generate_wallet / login──▶ Active (new session)
//!   Active ──expiry (observed lazily)──▶ Expired ──next check──▶ Anonymous
//!   any ──logout──▶ Anonymous
//! ```
//!
//! Expiry is never driven by a timer: it is observed by [`SessionLifecycle::initialize`]
//! and [`SessionLifecycle::require_active`], which delete the lapsed session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::Signature;

use crate::account::{Account, SignPayload};
use crate::authenticator::PlatformAuthenticator;
use crate::broker::{Credential, CredentialBroker};
use crate::clock::Clock;
use crate::config::{RegisterArgs, SessionOptions};
use crate::error::{PasskeyError, PasskeyResult};
use crate::key::RawKey;
use crate::session::{Session, SessionRecord, SessionStore};

/// Observable state of a [`SessionLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session.
    Anonymous,
    /// A session that has not expired.
    Active,
    /// A session whose expiry has passed but has not been cleaned up yet.
    Expired,
}

/// Orchestrates register, wallet generation, login and logout.
pub struct SessionLifecycle<A> {
    broker: Arc<CredentialBroker<A>>,
    store: SessionStore,
    options: SessionOptions,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<Arc<Session<A>>>>,
}

impl<A> std::fmt::Debug for SessionLifecycle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<A: PlatformAuthenticator> SessionLifecycle<A> {
    /// Creates a lifecycle in the `Anonymous` state.
    ///
    /// Call [`Self::initialize`] to pick up a persisted session.
    #[must_use]
    pub fn new(
        broker: Arc<CredentialBroker<A>>,
        store: SessionStore,
        options: SessionOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            broker,
            store,
            options,
            clock,
            current: Mutex::new(None),
        }
    }

    /// Configured options.
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Underlying credential broker.
    #[must_use]
    pub const fn broker(&self) -> &Arc<CredentialBroker<A>> {
        &self.broker
    }

    /// Underlying session store.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<Session<A>>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Current state, without side effects.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        let now = self.now();
        match self.current().as_ref() {
            None => LifecycleState::Anonymous,
            Some(session) if session.is_valid(now) => LifecycleState::Active,
            Some(_) => LifecycleState::Expired,
        }
    }

    /// Public fields of the current session, if one is held.
    #[must_use]
    pub fn session(&self) -> Option<SessionRecord> {
        self.current().as_ref().map(|session| session.record().clone())
    }

    /// Restores the persisted session, if a valid one exists.
    ///
    /// Never contacts the authenticator. Invalid persisted state is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error only if a storage tier fails.
    pub fn initialize(&self) -> PasskeyResult<Option<SessionRecord>> {
        let Some(loaded) = self.store.load(self.options.session_type, self.now())? else {
            *self.current() = None;
            return Ok(None);
        };

        let account = Credential::from_base64(&loaded.record.credential_id).and_then(|credential| {
            Account::new(
                loaded.record.session_type,
                loaded.key,
                loaded.record.address,
                credential,
                Arc::clone(&self.broker),
            )
        });
        let account = match account {
            Ok(account) => account,
            Err(e) => {
                log::warn!("discarding stored session: {e}");
                self.store.clear()?;
                *self.current() = None;
                return Ok(None);
            }
        };

        log::info!("restored session for {}", loaded.record.address);
        let record = loaded.record.clone();
        *self.current() = Some(Arc::new(Session::new(loaded.record, account)));
        Ok(Some(record))
    }

    /// Creates a new credential. Does not create a session.
    ///
    /// # Errors
    ///
    /// See [`CredentialBroker::create_credential`].
    pub async fn register(&self, args: &RegisterArgs) -> PasskeyResult<Credential> {
        let credential = self
            .broker
            .create_credential(args.rp_name(), args.user())
            .await?;
        log::info!("registered credential {}", credential.id_base64());
        Ok(credential)
    }

    /// Generates a new key, binds it to `credential` and starts a session.
    ///
    /// If the authenticator does not commit the write, no state changes.
    ///
    /// # Errors
    ///
    /// See [`CredentialBroker::write_key`]; also fails if storage fails.
    pub async fn generate_wallet(&self, credential: &Credential) -> PasskeyResult<SessionRecord> {
        let key = RawKey::generate();
        let written = self.broker.write_key(credential.raw_id(), &key).await?;
        self.activate(key, written)
    }

    /// Recovers the key from the authenticator and starts a session.
    ///
    /// With `credential == None` the user picks any credential registered
    /// for this relying party.
    ///
    /// # Errors
    ///
    /// See [`CredentialBroker::read_key`]; also fails if storage fails.
    pub async fn login(&self, credential: Option<&Credential>) -> PasskeyResult<SessionRecord> {
        let (credential, key) = self
            .broker
            .read_key(credential.map(Credential::raw_id))
            .await?;
        self.activate(key, credential)
    }

    fn activate(&self, key: RawKey, credential: Credential) -> PasskeyResult<SessionRecord> {
        let record = self
            .store
            .begin_session(&self.options, &key, &credential, self.now())?;
        let account = Account::new(
            self.options.session_type,
            Some(key),
            record.address,
            credential,
            Arc::clone(&self.broker),
        )?;
        *self.current() = Some(Arc::new(Session::new(record.clone(), account)));
        Ok(record)
    }

    /// Ends the session in every storage tier. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage tier fails.
    pub fn logout(&self) -> PasskeyResult<()> {
        *self.current() = None;
        self.store.clear()?;
        log::info!("logged out");
        Ok(())
    }

    /// Returns the current session if it is active.
    ///
    /// A lapsed session is deleted before returning `NotAuthenticated`.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` if there is no active session.
    pub fn require_active(&self) -> PasskeyResult<Arc<Session<A>>> {
        let now = self.now();
        let session = self.current().clone().ok_or(PasskeyError::NotAuthenticated)?;
        if !session.is_valid(now) {
            log::info!("session for {} expired", session.address());
            self.logout()?;
            return Err(PasskeyError::NotAuthenticated);
        }
        Ok(session)
    }

    /// Signs with the active session's account.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without an active session, otherwise see
    /// [`Account::sign`].
    pub async fn sign(&self, payload: &SignPayload) -> PasskeyResult<Signature> {
        let session = self.require_active()?;
        session.account().sign(payload).await
    }

    /// Exports the active session's key.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without an active session, otherwise see
    /// [`Account::export_key`].
    pub async fn export_key(&self) -> PasskeyResult<RawKey> {
        let session = self.require_active()?;
        session.account().export_key().await
    }
}
