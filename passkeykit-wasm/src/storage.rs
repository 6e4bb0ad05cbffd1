use web_sys::{Storage, Window};

use passkeykit_core::storage::{KeyValueStore, StorageError, StorageResult};

use crate::describe_js_error;

/// [`KeyValueStore`] over a Web Storage area.
#[derive(Debug, Clone)]
pub struct WebStorage(Storage);

impl WebStorage {
    /// `window.localStorage`, the durable tier.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the browser denies access.
    pub fn local(window: &Window) -> StorageResult<Self> {
        Self::open(window.local_storage(), "localStorage")
    }

    /// `window.sessionStorage`, the ephemeral tier.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the browser denies access.
    pub fn session(window: &Window) -> StorageResult<Self> {
        Self::open(window.session_storage(), "sessionStorage")
    }

    fn open(
        storage: Result<Option<Storage>, wasm_bindgen::JsValue>,
        name: &str,
    ) -> StorageResult<Self> {
        match storage {
            Ok(Some(storage)) => Ok(Self(storage)),
            Ok(None) => Err(StorageError::Unavailable(format!("{name} is not available"))),
            Err(e) => Err(StorageError::Unavailable(format!(
                "{name}: {}",
                describe_js_error(&e)
            ))),
        }
    }
}

impl KeyValueStore for WebStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.0
            .get_item(key)
            .map_err(|e| StorageError::Read(describe_js_error(&e)))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.0
            .set_item(key, value)
            .map_err(|e| StorageError::Write(describe_js_error(&e)))
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.0
            .remove_item(key)
            .map_err(|e| StorageError::Write(describe_js_error(&e)))
    }
}
