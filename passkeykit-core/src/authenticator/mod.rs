//! Platform authenticator interface.
//!
//! The authenticator is an opaque capability that can create a credential and
//! answer an assertion request carrying the `largeBlob` extension. The
//! extension output is the only channel through which key material enters or
//! leaves the authenticator.
//!
//! [`memory::MemoryAuthenticator`] is a software implementation for native
//! hosts and tests. Browser hosts implement [`PlatformAuthenticator`] on top of
//! `navigator.credentials`.

pub mod memory;

use thiserror::Error;
use zeroize::Zeroizing;

/// An authenticator-level failure.
///
/// A user decline, a timeout and a hardware error are deliberately not
/// distinguished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CeremonyError(pub String);

/// User account information sent with a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Human-palatable name shown by the authenticator.
    pub display_name: String,
    /// Opaque user handle.
    pub id: Vec<u8>,
    /// Account name.
    pub name: String,
}

/// How strongly registration asks for large-blob support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LargeBlobSupport {
    /// Creation must fail or report unsupported if the authenticator lacks it.
    Required,
    /// Support is requested but not mandatory.
    Preferred,
}

/// Whether the browser must show its account chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mediation {
    /// The browser decides.
    Optional,
    /// The user must always interact.
    Required,
}

/// Large-blob operation requested by an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LargeBlobRequest {
    /// Return the blob stored for the selected credential.
    Read,
    /// Replace the blob stored for the selected credential.
    Write(Zeroizing<Vec<u8>>),
}

/// Parameters of a credential creation ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOptions {
    /// Relying party name.
    pub rp_name: String,
    /// User the credential is created for.
    pub user: UserEntity,
    /// Ceremony challenge.
    pub challenge: Vec<u8>,
    /// COSE algorithm identifiers, in preference order.
    pub algorithms: Vec<i32>,
    /// Requested large-blob support.
    pub large_blob: LargeBlobSupport,
}

/// Parameters of an assertion ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOptions {
    /// Restricts the ceremony to one credential. `None` lets the user pick any
    /// credential registered for this relying party.
    pub allow_credential: Option<Vec<u8>>,
    /// Ceremony challenge.
    pub challenge: Vec<u8>,
    /// Mediation requirement.
    pub mediation: Mediation,
    /// Requested large-blob operation.
    pub large_blob: LargeBlobRequest,
}

/// Result of a creation ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCredential {
    /// Raw credential identifier.
    pub raw_id: Vec<u8>,
    /// `largeBlob.supported` from the extension results, if reported.
    pub large_blob_supported: Option<bool>,
}

/// `largeBlob` client extension output of an assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LargeBlobOutput {
    /// Blob returned by a read; `None` if nothing is stored.
    pub blob: Option<Zeroizing<Vec<u8>>>,
    /// Outcome of a write, if one was requested.
    pub written: Option<bool>,
}

/// Result of an assertion ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    /// Raw identifier of the credential the user selected.
    pub raw_id: Vec<u8>,
    /// `largeBlob` extension output; `None` if the authenticator did not
    /// report the extension at all.
    pub large_blob: Option<LargeBlobOutput>,
}

/// Platform or hardware authenticator.
///
/// Each call is one user-facing ceremony and may suspend until the user
/// approves or declines.
#[allow(async_fn_in_trait)]
pub trait PlatformAuthenticator {
    /// Creates a new credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the ceremony fails or is declined.
    async fn create(&self, options: CreationOptions) -> Result<CreatedCredential, CeremonyError>;

    /// Runs an assertion ceremony.
    ///
    /// # Errors
    ///
    /// Returns an error if the ceremony fails or is declined.
    async fn get(&self, options: AssertionOptions) -> Result<AssertionResponse, CeremonyError>;
}
