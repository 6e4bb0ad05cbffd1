use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::B256;
use js_sys::{Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use passkeykit_core::storage::KeyValueStore;
use passkeykit_core::{
    Credential, CredentialBroker, LifecycleState, RegisterArgs, SessionLifecycle, SessionOptions,
    SessionRecord, SessionStore, SignPayload, TypedData,
};

use crate::authenticator::WebAuthnAuthenticator;
use crate::console::JsClock;
use crate::storage::WebStorage;
use crate::{error_to_jsvalue, window};

type Lifecycle = SessionLifecycle<WebAuthnAuthenticator>;

/// A passkey wallet embedded directly in the host page.
#[wasm_bindgen]
pub struct PasskeyWallet(Rc<Lifecycle>);

fn record_to_jsvalue(record: &SessionRecord) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(record).map_err(Into::into)
}

#[wasm_bindgen]
impl PasskeyWallet {
    /// Creates a wallet for `options` (`{ sessionType, sessionTimeoutMs }`).
    ///
    /// Omitted options fall back to `session` mode with a three hour timeout.
    ///
    /// # Errors
    /// Returns a stringified error if the options are malformed or storage is
    /// unavailable.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<Self, JsValue> {
        let options: SessionOptions = if options.is_undefined() || options.is_null() {
            SessionOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };

        let window = window()?;
        let durable: Arc<dyn KeyValueStore> =
            Arc::new(WebStorage::local(&window).map_err(|e| error_to_jsvalue(&e.into()))?);
        let ephemeral: Arc<dyn KeyValueStore> =
            Arc::new(WebStorage::session(&window).map_err(|e| error_to_jsvalue(&e.into()))?);
        let broker = Arc::new(CredentialBroker::new(WebAuthnAuthenticator::new(window)));

        Ok(Self(Rc::new(SessionLifecycle::new(
            broker,
            SessionStore::new(durable, ephemeral),
            options,
            Arc::new(JsClock),
        ))))
    }

    /// Restores a persisted session without prompting.
    ///
    /// Resolves to the session (`{ sessionId, credentialId, address, expires,
    /// sessionType }`) or `null`.
    ///
    /// # Errors
    /// Returns a stringified error if storage fails.
    pub fn initialize(&self) -> Result<JsValue, JsValue> {
        match self.0.initialize().map_err(|e| error_to_jsvalue(&e))? {
            Some(record) => record_to_jsvalue(&record),
            None => Ok(JsValue::NULL),
        }
    }

    /// Creates a passkey and resolves to its base64 credential id.
    ///
    /// `args` is `{ displayName?, name?, appName? }`.
    pub fn register(&self, args: JsValue) -> Promise {
        let lifecycle = Rc::clone(&self.0);
        future_to_promise(async move {
            let args: RegisterArgs = if args.is_undefined() || args.is_null() {
                RegisterArgs::default()
            } else {
                serde_wasm_bindgen::from_value(args)?
            };
            let credential = lifecycle
                .register(&args)
                .await
                .map_err(|e| error_to_jsvalue(&e))?;
            Ok(JsValue::from_str(&credential.id_base64()))
        })
    }

    /// Generates a wallet key, stores it in the passkey `credentialId` and
    /// starts a session.
    #[wasm_bindgen(js_name = generateWallet)]
    pub fn generate_wallet(&self, credential_id: String) -> Promise {
        let lifecycle = Rc::clone(&self.0);
        future_to_promise(async move {
            let credential =
                Credential::from_base64(&credential_id).map_err(|e| error_to_jsvalue(&e))?;
            let record = lifecycle
                .generate_wallet(&credential)
                .await
                .map_err(|e| error_to_jsvalue(&e))?;
            record_to_jsvalue(&record)
        })
    }

    /// Reads the wallet key from a passkey and starts a session.
    ///
    /// Without `credentialId` the browser lets the user pick a passkey.
    pub fn login(&self, credential_id: Option<String>) -> Promise {
        let lifecycle = Rc::clone(&self.0);
        future_to_promise(async move {
            let credential = credential_id
                .as_deref()
                .map(Credential::from_base64)
                .transpose()
                .map_err(|e| error_to_jsvalue(&e))?;
            let record = lifecycle
                .login(credential.as_ref())
                .await
                .map_err(|e| error_to_jsvalue(&e))?;
            record_to_jsvalue(&record)
        })
    }

    /// Ends the session in both storage areas.
    ///
    /// # Errors
    /// Returns a stringified error if storage fails.
    pub fn logout(&self) -> Result<(), JsValue> {
        self.0.logout().map_err(|e| error_to_jsvalue(&e))
    }

    /// Signs `message` as an EIP-191 personal message.
    ///
    /// Resolves to a `0x`-prefixed 65-byte signature.
    #[wasm_bindgen(js_name = signMessage)]
    pub fn sign_message(&self, message: Vec<u8>) -> Promise {
        self.sign(SignPayload::Message(message))
    }

    /// Signs a `0x`-prefixed 32-byte digest.
    ///
    /// Resolves to a `0x`-prefixed 65-byte signature.
    #[wasm_bindgen(js_name = signHash)]
    pub fn sign_hash(&self, hash: String) -> Promise {
        match B256::from_str(&hash) {
            Ok(hash) => self.sign(SignPayload::Hash(hash)),
            Err(e) => Promise::reject(&JsValue::from_str(&format!("invalid_input_hash: {e}"))),
        }
    }

    /// Signs EIP-712 typed data given in `eth_signTypedData_v4` form.
    ///
    /// Resolves to a `0x`-prefixed 65-byte signature.
    #[wasm_bindgen(js_name = signTypedData)]
    pub fn sign_typed_data(&self, typed_data: JsValue) -> Promise {
        let parsed = serde_wasm_bindgen::from_value::<serde_json::Value>(typed_data)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                serde_json::from_value::<TypedData>(value).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(typed_data) => self.sign(SignPayload::TypedData(Box::new(typed_data))),
            Err(e) => Promise::reject(&JsValue::from_str(&format!("invalid_input_typedData: {e}"))),
        }
    }

    fn sign(&self, payload: SignPayload) -> Promise {
        let lifecycle = Rc::clone(&self.0);
        future_to_promise(async move {
            let signature = lifecycle
                .sign(&payload)
                .await
                .map_err(|e| error_to_jsvalue(&e))?;
            Ok(JsValue::from_str(&format!(
                "0x{}",
                hex::encode(signature.as_bytes())
            )))
        })
    }

    /// Resolves to the session's raw key, `0x`-prefixed.
    #[wasm_bindgen(js_name = exportKey)]
    pub fn export_key(&self) -> Promise {
        let lifecycle = Rc::clone(&self.0);
        future_to_promise(async move {
            let key = lifecycle
                .export_key()
                .await
                .map_err(|e| error_to_jsvalue(&e))?;
            Ok(JsValue::from_str(&key.to_hex()))
        })
    }

    /// Address of the current session, checksum encoded.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.0.session().map(|record| record.address.to_checksum(None))
    }

    /// Base64 credential id of the current session.
    #[must_use]
    #[wasm_bindgen(js_name = credentialId)]
    pub fn credential_id(&self) -> Option<String> {
        self.0.session().map(|record| record.credential_id)
    }

    /// Token of the current session.
    #[must_use]
    #[wasm_bindgen(js_name = sessionId)]
    pub fn session_id(&self) -> Option<String> {
        self.0.session().map(|record| record.session_id)
    }

    /// `"anonymous"`, `"active"` or `"expired"`.
    #[must_use]
    pub fn state(&self) -> String {
        match self.0.state() {
            LifecycleState::Anonymous => "anonymous",
            LifecycleState::Active => "active",
            LifecycleState::Expired => "expired",
        }
        .to_string()
    }

    /// Whether this browser exposes passkeys at all.
    ///
    /// Large-blob support can only be learned by registering.
    #[wasm_bindgen(js_name = isAvailable)]
    #[must_use]
    pub fn is_available() -> bool {
        web_sys::window().is_some_and(|window| {
            Reflect::has(&window, &JsValue::from_str("PublicKeyCredential")).unwrap_or(false)
        })
    }
}
