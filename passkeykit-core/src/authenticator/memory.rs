//! In-memory software authenticator.
//!
//! This implementation is NOT secure for production use: blobs are kept in
//! process memory and every ceremony is approved without user interaction.
//! It exists so the session engine can be driven end to end on native hosts
//! and in tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::{
    AssertionOptions, AssertionResponse, CeremonyError, CreatedCredential, CreationOptions,
    LargeBlobOutput, LargeBlobRequest, PlatformAuthenticator, UserEntity,
};

const CREDENTIAL_ID_LEN: usize = 16;

/// A credential held by [`MemoryAuthenticator`].
#[derive(Debug, Clone)]
pub struct MemoryCredential {
    /// Raw credential identifier.
    pub raw_id: Vec<u8>,
    /// Relying party the credential was created for.
    pub rp_name: String,
    /// User the credential was created for.
    pub user: UserEntity,
    /// Stored large blob.
    pub blob: Option<Zeroizing<Vec<u8>>>,
}

/// Software [`PlatformAuthenticator`] with switches for failure modes.
#[derive(Debug)]
pub struct MemoryAuthenticator {
    credentials: Mutex<Vec<MemoryCredential>>,
    selected: Mutex<Option<Vec<u8>>>,
    large_blob_supported: AtomicBool,
    fail_writes: AtomicBool,
    decline: AtomicBool,
    creates: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl Default for MemoryAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthenticator {
    /// Creates an authenticator with large-blob support and no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(Vec::new()),
            selected: Mutex::new(None),
            large_blob_supported: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            decline: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Creates an authenticator that does not implement the large-blob extension.
    #[must_use]
    pub fn without_large_blob() -> Self {
        let authenticator = Self::new();
        authenticator.set_large_blob_supported(false);
        authenticator
    }

    /// Toggles large-blob support.
    pub fn set_large_blob_supported(&self, supported: bool) {
        self.large_blob_supported.store(supported, Ordering::SeqCst);
    }

    /// Makes every large-blob write report `written: false`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every ceremony fail as if the user declined.
    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    /// Chooses the credential the user picks in a discoverable assertion.
    ///
    /// By default the most recently created credential is picked.
    pub fn select_credential(&self, raw_id: Option<Vec<u8>>) {
        if let Ok(mut guard) = self.selected.lock() {
            *guard = raw_id;
        }
    }

    /// Adds a credential directly, e.g. a passkey created by another application.
    pub fn insert_credential(&self, credential: MemoryCredential) {
        if let Ok(mut guard) = self.credentials.lock() {
            guard.push(credential);
        }
    }

    /// Returns the blob currently stored for `raw_id`.
    #[must_use]
    pub fn blob(&self, raw_id: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        self.credentials.lock().ok().and_then(|guard| {
            guard
                .iter()
                .find(|credential| credential.raw_id == raw_id)
                .and_then(|credential| credential.blob.clone())
        })
    }

    /// Number of creation ceremonies run.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of large-blob read ceremonies run.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of large-blob write ceremonies run.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_declined(&self) -> Result<(), CeremonyError> {
        if self.decline.load(Ordering::SeqCst) {
            return Err(CeremonyError(
                "The operation either timed out or was not allowed.".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_error() -> CeremonyError {
        CeremonyError("authenticator state poisoned".to_string())
    }
}

impl PlatformAuthenticator for MemoryAuthenticator {
    async fn create(&self, options: CreationOptions) -> Result<CreatedCredential, CeremonyError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_declined()?;

        let mut raw_id = vec![0u8; CREDENTIAL_ID_LEN];
        OsRng.fill_bytes(&mut raw_id);

        self.credentials
            .lock()
            .map_err(|_| Self::lock_error())?
            .push(MemoryCredential {
                raw_id: raw_id.clone(),
                rp_name: options.rp_name,
                user: options.user,
                blob: None,
            });

        Ok(CreatedCredential {
            raw_id,
            large_blob_supported: Some(self.large_blob_supported.load(Ordering::SeqCst)),
        })
    }

    async fn get(&self, options: AssertionOptions) -> Result<AssertionResponse, CeremonyError> {
        match options.large_blob {
            LargeBlobRequest::Read => self.reads.fetch_add(1, Ordering::SeqCst),
            LargeBlobRequest::Write(_) => self.writes.fetch_add(1, Ordering::SeqCst),
        };
        self.check_declined()?;

        let target = match options.allow_credential {
            Some(raw_id) => raw_id,
            None => {
                let selected = self.selected.lock().map_err(|_| Self::lock_error())?.clone();
                match selected {
                    Some(raw_id) => raw_id,
                    None => self
                        .credentials
                        .lock()
                        .map_err(|_| Self::lock_error())?
                        .last()
                        .map(|credential| credential.raw_id.clone())
                        .ok_or_else(|| CeremonyError("no credentials available".to_string()))?,
                }
            }
        };

        let mut credentials = self.credentials.lock().map_err(|_| Self::lock_error())?;
        let credential = credentials
            .iter_mut()
            .find(|credential| credential.raw_id == target)
            .ok_or_else(|| CeremonyError("credential not recognized".to_string()))?;

        let large_blob = if self.large_blob_supported.load(Ordering::SeqCst) {
            Some(match options.large_blob {
                LargeBlobRequest::Read => LargeBlobOutput {
                    blob: credential.blob.clone(),
                    written: None,
                },
                LargeBlobRequest::Write(bytes) => {
                    let written = !self.fail_writes.load(Ordering::SeqCst);
                    if written {
                        credential.blob = Some(bytes);
                    }
                    LargeBlobOutput {
                        blob: None,
                        written: Some(written),
                    }
                }
            })
        } else {
            None
        };

        Ok(AssertionResponse {
            raw_id: credential.raw_id.clone(),
            large_blob,
        })
    }
}
