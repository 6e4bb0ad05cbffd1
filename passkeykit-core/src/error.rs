//! Error taxonomy shared by every operation.

use alloy_primitives::Address;
use thiserror::Error;

use crate::storage::StorageError;

/// Result type for `PasskeyKit` operations.
pub type PasskeyResult<T, E = PasskeyError> = std::result::Result<T, E>;

/// Error outputs from `PasskeyKit`
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// The authenticator cannot store or return a large blob for the credential.
    ///
    /// Not retryable without a different authenticator.
    #[error("unsupported_authenticator")]
    UnsupportedAuthenticator,
    /// The credential exists but has no usable key bound to it.
    #[error("invalid_credential: {0}")]
    InvalidCredential(String),
    /// The authenticator did not commit the large-blob write.
    #[error("key_store_write_failed")]
    KeyStoreWriteFailed,
    /// A persisted session failed validation and was discarded.
    #[error("invalid_session")]
    InvalidSession,
    /// A privileged operation was attempted without a valid session.
    #[error("not_authenticated")]
    NotAuthenticated,
    /// A sandbox request carried an unrecognized `type`.
    #[error("unknown_message: {0}")]
    UnknownMessage(String),
    /// The key recovered from the authenticator derives a different address.
    #[error("account_address_mismatch: expected {expected}, found {found}")]
    AccountAddressMismatch {
        /// Address recorded for the session.
        expected: Address,
        /// Address derived from the recovered key.
        found: Address,
    },
    /// The ceremony failed at the authenticator, including a user decline.
    #[error("ceremony_failed: {0}")]
    Ceremony(String),
    /// Producing a signature failed.
    #[error("signing_error: {0}")]
    Signing(String),
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
    /// The sandbox page was opened without a `ref` query parameter.
    #[error("missing_referrer")]
    MissingReferrer,
    /// Unexpected error serializing information
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// Failure in one of the storage tiers.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for PasskeyError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
