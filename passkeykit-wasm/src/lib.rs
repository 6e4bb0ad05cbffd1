//! WebAssembly bindings for `passkeykit_core`.
//!
//! Exposes the [`PasskeyWallet`] class for pages that embed the wallet and
//! [`start_sandbox`] for the isolated signing page, both running against
//! `navigator.credentials`, `localStorage` and `sessionStorage`.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::future_not_send,
    clippy::arc_with_non_send_sync
)]

use std::sync::Arc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use passkeykit_core::error::PasskeyError;
use passkeykit_core::logger::set_logger;

mod authenticator;
mod console;
mod sandbox;
mod storage;
mod wallet;

pub use authenticator::WebAuthnAuthenticator;
pub use console::{ConsoleLogger, JsClock};
pub use sandbox::start_sandbox;
pub use storage::WebStorage;
pub use wallet::PasskeyWallet;

/// Installs the panic hook and routes log output to the console.
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    set_logger(Arc::new(ConsoleLogger));
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))
}

fn describe_js_error(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|error| String::from(error.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

fn error_to_jsvalue(error: &PasskeyError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[wasm_bindgen(typescript_custom_section)]
const TYPESCRIPT_DEFS: &str = r#"
export type SessionType = "session" | "passkey";

export interface SessionOptions {
    sessionType?: SessionType;
    sessionTimeoutMs?: number;
}

export interface RegisterArgs {
    displayName?: string;
    name?: string;
    appName?: string;
}

export interface SessionRecord {
    sessionId: string;
    credentialId: string;
    address: string;
    expires: number;
    sessionType: SessionType;
}
"#;
