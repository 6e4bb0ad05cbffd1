//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use passkeykit_core::authenticator::memory::MemoryAuthenticator;
use passkeykit_core::clock::FixedClock;
use passkeykit_core::error::PasskeyResult;
use passkeykit_core::sandbox::{Response, Sandbox, SandboxEnvironment, Transport};
use passkeykit_core::storage::MemoryStorage;
use passkeykit_core::{CredentialBroker, SessionLifecycle, SessionOptions, SessionStore, SessionType};

/// Wall clock every test starts at, in epoch milliseconds.
pub const NOW: u64 = 1_700_000_000_000;
/// Origin of the page hosting the wallet.
pub const APP_ORIGIN: &str = "https://app.example";
/// A second, unrelated site.
pub const OTHER_ORIGIN: &str = "https://other.example";

/// Routes `log` output through `tracing-subscriber`, honoring `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One browser profile: a single authenticator and both storage tiers.
///
/// `ephemeral` is the host tab's `sessionStorage`. Sandbox popups never see
/// it; each one opens with its own empty tier.
pub struct Browser {
    /// Profile-wide `localStorage`.
    pub durable: Arc<MemoryStorage>,
    /// The host tab's `sessionStorage`.
    pub ephemeral: Arc<MemoryStorage>,
    /// Shared clock.
    pub clock: Arc<FixedClock>,
    /// Broker over the profile's authenticator.
    pub broker: Arc<CredentialBroker<MemoryAuthenticator>>,
}

impl Browser {
    /// A profile with no credentials and empty storage.
    pub fn new() -> Self {
        init_logging();
        Self {
            durable: Arc::new(MemoryStorage::new()),
            ephemeral: Arc::new(MemoryStorage::new()),
            clock: Arc::new(FixedClock::new(NOW)),
            broker: Arc::new(CredentialBroker::new(MemoryAuthenticator::new())),
        }
    }

    /// The profile's software authenticator.
    pub fn authenticator(&self) -> &MemoryAuthenticator {
        self.broker.authenticator()
    }

    /// A lifecycle as the host page would build it on load.
    pub fn lifecycle(&self, session_type: SessionType) -> SessionLifecycle<MemoryAuthenticator> {
        SessionLifecycle::new(
            Arc::clone(&self.broker),
            SessionStore::new(self.durable.clone(), self.ephemeral.clone()),
            SessionOptions::new(session_type),
            self.clock.clone(),
        )
    }

    /// Environment of a newly opened popup: shared durable tier, fresh
    /// ephemeral tier.
    pub fn popup_environment(&self) -> (SandboxEnvironment<MemoryAuthenticator>, Arc<MemoryStorage>) {
        let ephemeral = Arc::new(MemoryStorage::new());
        let env = SandboxEnvironment {
            broker: Arc::clone(&self.broker),
            durable: self.durable.clone(),
            ephemeral: ephemeral.clone(),
            clock: self.clock.clone(),
        };
        (env, ephemeral)
    }

    /// A freshly opened sandbox page trusting `origin`.
    pub fn open_sandbox(&self, origin: &str) -> Sandbox<MemoryAuthenticator> {
        Sandbox::new(origin, self.popup_environment().0)
    }

    /// Opens a popup for `origin`, posts `request` from it and returns the
    /// single response.
    pub async fn round_trip(&self, origin: &str, request: serde_json::Value) -> Response {
        self.round_trip_with_storage(origin, request).await.0
    }

    /// Like [`Browser::round_trip`], also returning the popup's ephemeral
    /// tier as it was when the popup closed.
    pub async fn round_trip_with_storage(
        &self,
        origin: &str,
        request: serde_json::Value,
    ) -> (Response, Arc<MemoryStorage>) {
        let (env, ephemeral) = self.popup_environment();
        let sandbox = Sandbox::new(origin, env);
        let transport = RecordingTransport::default();
        assert!(sandbox.handle_message(origin, &request, &transport).await);
        assert!(transport.is_closed());
        let mut posted = transport.take();
        assert_eq!(posted.len(), 1);
        let (response, target) = posted.remove(0);
        assert_eq!(target, origin);
        (response, ephemeral)
    }
}

/// Captures what the sandbox posts back to its opener.
#[derive(Default)]
pub struct RecordingTransport {
    posted: RefCell<Vec<(Response, String)>>,
    closed: Cell<bool>,
}

impl RecordingTransport {
    /// Drains the posted `(response, target origin)` pairs.
    pub fn take(&self) -> Vec<(Response, String)> {
        self.posted.take()
    }

    /// Number of responses posted so far.
    pub fn posted_count(&self) -> usize {
        self.posted.borrow().len()
    }

    /// Whether the page asked to close.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Transport for RecordingTransport {
    fn post_message(&self, response: &Response, target_origin: &str) -> PasskeyResult<()> {
        self.posted
            .borrow_mut()
            .push((response.clone(), target_origin.to_string()));
        Ok(())
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

/// The `Mail` example of EIP-712, in `eth_signTypedData_v4` JSON form.
pub fn mail_typed_data() -> serde_json::Value {
    serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Person": [
                { "name": "name", "type": "string" },
                { "name": "wallet", "type": "address" }
            ],
            "Mail": [
                { "name": "from", "type": "Person" },
                { "name": "to", "type": "Person" },
                { "name": "contents", "type": "string" }
            ]
        },
        "primaryType": "Mail",
        "domain": {
            "name": "Ether Mail",
            "version": "1",
            "chainId": 1,
            "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
        },
        "message": {
            "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
            "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
            "contents": "Hello, Bob!"
        }
    })
}
