//! [`PlatformAuthenticator`] over `navigator.credentials`.
//!
//! `web-sys` has no typed accessors for the `largeBlob` extension, so the
//! request objects are assembled and the extension results read with
//! `Reflect`.

use js_sys::{Array, ArrayBuffer, Function, Object, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{CredentialCreationOptions, CredentialRequestOptions, Window};
use zeroize::Zeroizing;

use passkeykit_core::authenticator::{
    AssertionOptions, AssertionResponse, CeremonyError, CreatedCredential, CreationOptions,
    LargeBlobOutput, LargeBlobRequest, LargeBlobSupport, Mediation, PlatformAuthenticator,
};

use crate::describe_js_error;

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

fn get(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
}

fn bytes(value: &[u8]) -> JsValue {
    Uint8Array::from(value).into()
}

fn read_raw_id(credential: &JsValue) -> Result<Vec<u8>, JsValue> {
    let raw_id = get(credential, "rawId")?.dyn_into::<ArrayBuffer>()?;
    Ok(Uint8Array::new(&raw_id).to_vec())
}

/// `credential.getClientExtensionResults().largeBlob`, possibly `undefined`.
fn large_blob_results(credential: &JsValue) -> Result<JsValue, JsValue> {
    let results = get(credential, "getClientExtensionResults")?
        .dyn_into::<Function>()?
        .call0(credential)?;
    get(&results, "largeBlob")
}

/// Passkey ceremonies of one browser window.
#[derive(Debug, Clone)]
pub struct WebAuthnAuthenticator {
    window: Window,
}

impl WebAuthnAuthenticator {
    /// Authenticator of `window`.
    #[must_use]
    pub const fn new(window: Window) -> Self {
        Self { window }
    }

    fn creation_options(options: &CreationOptions) -> Result<CredentialCreationOptions, JsValue> {
        let rp = Object::new();
        set(&rp, "name", &JsValue::from_str(&options.rp_name))?;

        let user = Object::new();
        set(&user, "displayName", &JsValue::from_str(&options.user.display_name))?;
        set(&user, "id", &bytes(&options.user.id))?;
        set(&user, "name", &JsValue::from_str(&options.user.name))?;

        let params = Array::new();
        for alg in &options.algorithms {
            let param = Object::new();
            set(&param, "alg", &JsValue::from(*alg))?;
            set(&param, "type", &JsValue::from_str("public-key"))?;
            params.push(&param);
        }

        let support = match options.large_blob {
            LargeBlobSupport::Required => "required",
            LargeBlobSupport::Preferred => "preferred",
        };
        let large_blob = Object::new();
        set(&large_blob, "support", &JsValue::from_str(support))?;
        let extensions = Object::new();
        set(&extensions, "largeBlob", &large_blob)?;

        let public_key = Object::new();
        set(&public_key, "rp", &rp)?;
        set(&public_key, "user", &user)?;
        set(&public_key, "challenge", &bytes(&options.challenge))?;
        set(&public_key, "pubKeyCredParams", &params)?;
        set(&public_key, "extensions", &extensions)?;

        let request = Object::new();
        set(&request, "publicKey", &public_key)?;
        Ok(request.unchecked_into())
    }

    fn request_options(options: &AssertionOptions) -> Result<CredentialRequestOptions, JsValue> {
        let large_blob = Object::new();
        match &options.large_blob {
            LargeBlobRequest::Read => set(&large_blob, "read", &JsValue::TRUE)?,
            LargeBlobRequest::Write(blob) => set(&large_blob, "write", &bytes(blob))?,
        }
        let extensions = Object::new();
        set(&extensions, "largeBlob", &large_blob)?;

        let public_key = Object::new();
        if let Some(raw_id) = &options.allow_credential {
            let descriptor = Object::new();
            set(&descriptor, "type", &JsValue::from_str("public-key"))?;
            set(&descriptor, "id", &bytes(raw_id))?;
            set(&public_key, "allowCredentials", &Array::of1(&descriptor))?;
        }
        set(&public_key, "challenge", &bytes(&options.challenge))?;
        set(&public_key, "extensions", &extensions)?;
        set(&public_key, "userVerification", &JsValue::from_str("preferred"))?;

        let request = Object::new();
        set(&request, "publicKey", &public_key)?;
        if options.mediation == Mediation::Required {
            set(&request, "mediation", &JsValue::from_str("required"))?;
        }
        Ok(request.unchecked_into())
    }

    async fn create_credential(
        &self,
        options: &CreationOptions,
    ) -> Result<CreatedCredential, JsValue> {
        let request = Self::creation_options(options)?;
        let promise = self
            .window
            .navigator()
            .credentials()
            .create_with_options(&request)?;
        let credential = JsFuture::from(promise).await?;

        let results = large_blob_results(&credential)?;
        let large_blob_supported = if results.is_object() {
            get(&results, "supported")?.as_bool()
        } else {
            None
        };
        Ok(CreatedCredential {
            raw_id: read_raw_id(&credential)?,
            large_blob_supported,
        })
    }

    async fn get_assertion(&self, options: &AssertionOptions) -> Result<AssertionResponse, JsValue> {
        let request = Self::request_options(options)?;
        let promise = self
            .window
            .navigator()
            .credentials()
            .get_with_options(&request)?;
        let credential = JsFuture::from(promise).await?;

        let results = large_blob_results(&credential)?;
        let large_blob = if results.is_object() {
            let blob = get(&results, "blob")?
                .dyn_into::<ArrayBuffer>()
                .ok()
                .map(|buffer| Zeroizing::new(Uint8Array::new(&buffer).to_vec()));
            let written = get(&results, "written")?.as_bool();
            Some(LargeBlobOutput { blob, written })
        } else {
            None
        };

        Ok(AssertionResponse {
            raw_id: read_raw_id(&credential)?,
            large_blob,
        })
    }
}

impl PlatformAuthenticator for WebAuthnAuthenticator {
    async fn create(&self, options: CreationOptions) -> Result<CreatedCredential, CeremonyError> {
        self.create_credential(&options)
            .await
            .map_err(|e| CeremonyError(describe_js_error(&e)))
    }

    async fn get(&self, options: AssertionOptions) -> Result<AssertionResponse, CeremonyError> {
        self.get_assertion(&options)
            .await
            .map_err(|e| CeremonyError(describe_js_error(&e)))
    }
}
