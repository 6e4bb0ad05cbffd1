use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{MessageEvent, Window};

use passkeykit_core::error::{PasskeyError, PasskeyResult};
use passkeykit_core::sandbox::{Response, Sandbox, SandboxEnvironment, Transport};
use passkeykit_core::CredentialBroker;

use crate::authenticator::WebAuthnAuthenticator;
use crate::console::JsClock;
use crate::storage::WebStorage;
use crate::{describe_js_error, error_to_jsvalue, window};

/// Replies through `window.opener` and closes the sandbox window.
struct WindowTransport {
    window: Window,
}

impl Transport for WindowTransport {
    fn post_message(&self, response: &Response, target_origin: &str) -> PasskeyResult<()> {
        let message = response
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| PasskeyError::Serialization(e.to_string()))?;
        let opener = self
            .window
            .opener()
            .map_err(|e| PasskeyError::Serialization(describe_js_error(&e)))?;
        if opener.is_null() || opener.is_undefined() {
            return Err(PasskeyError::Serialization("sandbox has no opener".to_string()));
        }
        opener
            .unchecked_into::<Window>()
            .post_message(&message, target_origin)
            .map_err(|e| PasskeyError::Serialization(describe_js_error(&e)))
    }

    fn close(&self) {
        if let Err(e) = self.window.close() {
            log::warn!("failed to close sandbox: {}", describe_js_error(&e));
        }
    }
}

fn environment(window: &Window) -> PasskeyResult<SandboxEnvironment<WebAuthnAuthenticator>> {
    Ok(SandboxEnvironment {
        broker: Arc::new(CredentialBroker::new(WebAuthnAuthenticator::new(
            window.clone(),
        ))),
        durable: Arc::new(WebStorage::local(window)?),
        ephemeral: Arc::new(WebStorage::session(window)?),
        clock: Arc::new(JsClock),
    })
}

/// Runs the sandbox page.
///
/// Reads the trusted origin from `?ref=`, then waits for one message from it,
/// answers through `window.opener` and closes the window.
///
/// # Errors
/// Returns a stringified error if the page has no `ref` parameter or storage
/// is unavailable.
#[wasm_bindgen(js_name = startSandbox)]
pub fn start_sandbox() -> Result<(), JsValue> {
    let window = window()?;
    let query = window.location().search()?;
    let env = environment(&window).map_err(|e| error_to_jsvalue(&e))?;
    let sandbox = Rc::new(Sandbox::from_query(&query, env).map_err(|e| error_to_jsvalue(&e))?);
    let transport = Rc::new(WindowTransport {
        window: window.clone(),
    });
    log::info!("sandbox ready for {}", sandbox.trusted_origin());

    let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        let origin = event.origin();
        if !sandbox.accept(&origin) {
            log::debug!("ignoring message from {origin}");
            return;
        }
        let data = serde_wasm_bindgen::from_value::<serde_json::Value>(event.data())
            .unwrap_or(serde_json::Value::Null);
        let sandbox = Rc::clone(&sandbox);
        let transport = Rc::clone(&transport);
        spawn_local(async move {
            sandbox
                .handle_message(&origin, &data, transport.as_ref())
                .await;
        });
    });
    window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;
    listener.forget();
    Ok(())
}
