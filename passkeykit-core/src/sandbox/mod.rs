//! One-shot request handler for the isolated signing page.
//!
//! The sandbox runs in a window opened by the wallet's host page. It trusts
//! exactly one origin, read from the `ref` query parameter when the page
//! loads, and handles exactly one message from it. Whatever the outcome, a
//! response is posted back to that origin and the page is closed.
//!
//! Session state is kept per requesting origin, so two sites opening the
//! same sandbox never see each other's session. Sessions are always served
//! in passkey mode: the page's own tab storage does not outlive the reply.

use std::cell::Cell;
use std::sync::Arc;

use serde_json::Value;

use crate::account::SignPayload;
use crate::authenticator::PlatformAuthenticator;
use crate::broker::{Credential, CredentialBroker};
use crate::clock::Clock;
use crate::config::{SessionOptions, SessionType};
use crate::error::{PasskeyError, PasskeyResult};
use crate::lifecycle::SessionLifecycle;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

pub mod message;

pub use message::{Request, RequestType, Response, WireSignPayload};

/// Name of the query parameter carrying the trusted origin.
pub const REFERRER_PARAM: &str = "ref";

/// Reads the trusted origin from the page's query string.
///
/// A leading `?` is accepted.
///
/// # Errors
///
/// Returns `MissingReferrer` if `ref` is absent or empty.
pub fn referrer_from_query(query: &str) -> PasskeyResult<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == REFERRER_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or(PasskeyError::MissingReferrer)
}

/// Channel back to the page that opened the sandbox.
pub trait Transport {
    /// Posts `response` to the window that opened the sandbox, restricted to
    /// `target_origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be delivered.
    fn post_message(&self, response: &Response, target_origin: &str) -> PasskeyResult<()>;

    /// Closes the sandbox page.
    fn close(&self);
}

struct CloseOnDrop<'a, T: Transport + ?Sized>(&'a T);

impl<T: Transport + ?Sized> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Platform services the sandbox runs against.
pub struct SandboxEnvironment<A> {
    /// Broker over the platform authenticator.
    pub broker: Arc<CredentialBroker<A>>,
    /// Tier that outlives the tab.
    pub durable: Arc<dyn KeyValueStore>,
    /// Tier cleared with the tab.
    pub ephemeral: Arc<dyn KeyValueStore>,
    /// Time source for session expiry.
    pub clock: Arc<dyn Clock>,
}

impl<A> Clone for SandboxEnvironment<A> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            durable: Arc::clone(&self.durable),
            ephemeral: Arc::clone(&self.ephemeral),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Handles a single request from the trusted origin.
pub struct Sandbox<A> {
    trusted_origin: String,
    handled: Cell<bool>,
    env: SandboxEnvironment<A>,
}

impl<A> std::fmt::Debug for Sandbox<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("trusted_origin", &self.trusted_origin)
            .field("handled", &self.handled.get())
            .finish_non_exhaustive()
    }
}

impl<A: PlatformAuthenticator> Sandbox<A> {
    /// Creates a sandbox trusting `trusted_origin`.
    #[must_use]
    pub fn new(trusted_origin: impl Into<String>, env: SandboxEnvironment<A>) -> Self {
        Self {
            trusted_origin: trusted_origin.into(),
            handled: Cell::new(false),
            env,
        }
    }

    /// Creates a sandbox trusting the origin named by the page's query string.
    ///
    /// # Errors
    ///
    /// Returns `MissingReferrer` if the query has no `ref`.
    pub fn from_query(query: &str, env: SandboxEnvironment<A>) -> PasskeyResult<Self> {
        Ok(Self::new(referrer_from_query(query)?, env))
    }

    /// The one origin whose messages are handled.
    #[must_use]
    pub fn trusted_origin(&self) -> &str {
        &self.trusted_origin
    }

    /// Whether the one message has been taken.
    #[must_use]
    pub fn has_handled(&self) -> bool {
        self.handled.get()
    }

    /// Whether a message from `origin` would be handled.
    #[must_use]
    pub fn accept(&self, origin: &str) -> bool {
        !self.handled.get() && origin == self.trusted_origin
    }

    /// Handles a posted message.
    ///
    /// Messages from other origins, and any message after the first accepted
    /// one, are ignored and `false` is returned. For the accepted message a
    /// response is always posted to the trusted origin, errors included, and
    /// the page is closed afterwards.
    pub async fn handle_message<T: Transport + ?Sized>(
        &self,
        origin: &str,
        data: &Value,
        transport: &T,
    ) -> bool {
        if !self.accept(origin) {
            log::debug!("ignoring message from {origin}");
            return false;
        }
        self.handled.set(true);
        let _close = CloseOnDrop(transport);

        let response = match Request::parse(data) {
            Ok(request) => {
                let request_type = request.request_type();
                self.dispatch(request).await.unwrap_or_else(|e| {
                    log::warn!("{request_type} request failed: {e}");
                    Response::failure(&e)
                })
            }
            Err(e) => {
                log::warn!("rejecting message: {e}");
                Response::failure(&e)
            }
        };

        if let Err(e) = transport.post_message(&response, &self.trusted_origin) {
            log::error!("failed to post response: {e}");
        }
        true
    }

    /// Executes a parsed request against the trusted origin's session.
    ///
    /// # Errors
    ///
    /// Returns any error of the underlying operation. `get`, `sign` and
    /// `export` return `NotAuthenticated` unless `sessionId` names the active
    /// session.
    pub async fn dispatch(&self, request: Request) -> PasskeyResult<Response> {
        match request {
            Request::Get(get) => {
                let lifecycle = self.authenticate(&get.session_id)?;
                let record = lifecycle.session().ok_or(PasskeyError::NotAuthenticated)?;
                Ok(Response::credentials(&record))
            }
            Request::Register(register) => {
                let lifecycle = self.lifecycle(popup_options(register.options()));
                lifecycle.logout()?;
                let credential = lifecycle.register(&register.args()).await?;
                let record = lifecycle.generate_wallet(&credential).await?;
                Ok(Response::credentials(&record))
            }
            Request::Login(login) => {
                let credential = login
                    .requested_credential_id
                    .as_deref()
                    .map(Credential::from_base64)
                    .transpose()?;
                let lifecycle = self.lifecycle(popup_options(login.options()));
                lifecycle.logout()?;
                let record = lifecycle.login(credential.as_ref()).await?;
                Ok(Response::credentials(&record))
            }
            Request::Logout(_) => {
                self.store().clear()?;
                log::info!("logged out {}", self.trusted_origin);
                Ok(Response::ok())
            }
            Request::Sign(sign) => {
                let payload = SignPayload::try_from(&sign.payload)?;
                let lifecycle = self.authenticate(&sign.session_id)?;
                let signature = lifecycle.sign(&payload).await?;
                Ok(Response::signature(&sign.session_id, &signature))
            }
            Request::Export(export) => {
                let lifecycle = self.authenticate(&export.session_id)?;
                let key = lifecycle.export_key().await?;
                Ok(Response::private_key(&export.session_id, key.to_hex().to_string()))
            }
        }
    }

    fn store(&self) -> SessionStore {
        SessionStore::for_origin(
            Arc::clone(&self.env.durable),
            Arc::clone(&self.env.ephemeral),
            &self.trusted_origin,
        )
    }

    fn lifecycle(&self, options: SessionOptions) -> SessionLifecycle<A> {
        SessionLifecycle::new(
            Arc::clone(&self.env.broker),
            self.store(),
            options,
            Arc::clone(&self.env.clock),
        )
    }

    /// Restores the stored session in the mode it was created with and checks
    /// that `session_id` names it.
    fn authenticate(&self, session_id: &str) -> PasskeyResult<SessionLifecycle<A>> {
        let store = self.store();
        let Some(session_type) = store.stored_session_type()? else {
            store.clear()?;
            return Err(PasskeyError::NotAuthenticated);
        };
        let lifecycle = self.lifecycle(SessionOptions::new(session_type));
        lifecycle.initialize()?;
        let session = lifecycle.require_active()?;
        if session.session_id() != session_id {
            log::warn!("session id mismatch for {}", self.trusted_origin);
            return Err(PasskeyError::NotAuthenticated);
        }
        Ok(lifecycle)
    }
}

/// Downgrades cached sessions to refetching ones.
///
/// Every sandbox page is a fresh top-level window, so its ephemeral tier is
/// empty on open and discarded on close. A key cached there would be gone
/// before the next request.
fn popup_options(options: SessionOptions) -> SessionOptions {
    if options.session_type == SessionType::Session {
        log::info!("sandbox serves session mode as passkey mode");
    }
    SessionOptions {
        session_type: SessionType::Passkey,
        ..options
    }
}
