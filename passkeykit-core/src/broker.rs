//! Authenticator-as-key-store protocol.
//!
//! Every operation is exactly one ceremony. The `largeBlob` slot of a
//! credential holds the raw key; the application only ever keeps the
//! credential identifier.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use crate::authenticator::{
    AssertionOptions, CreationOptions, LargeBlobRequest, LargeBlobSupport, Mediation,
    PlatformAuthenticator, UserEntity,
};
use crate::defaults::{CEREMONY_CHALLENGE, PUBLIC_KEY_ALGORITHMS};
use crate::error::{PasskeyError, PasskeyResult};
use crate::key::RawKey;

/// An authenticator-issued credential identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    raw_id: Vec<u8>,
}

impl Credential {
    /// Wraps a raw credential identifier.
    #[must_use]
    pub const fn new(raw_id: Vec<u8>) -> Self {
        Self { raw_id }
    }

    /// Parses the base64 display form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `encoded` is not standard base64.
    pub fn from_base64(encoded: &str) -> PasskeyResult<Self> {
        STANDARD
            .decode(encoded)
            .map(Self::new)
            .map_err(|e| PasskeyError::InvalidInput {
                attribute: "credential_id".to_string(),
                reason: e.to_string(),
            })
    }

    /// Raw identifier bytes.
    #[must_use]
    pub fn raw_id(&self) -> &[u8] {
        &self.raw_id
    }

    /// Standard base64 form, used for storage and display.
    #[must_use]
    pub fn id_base64(&self) -> String {
        STANDARD.encode(&self.raw_id)
    }
}

/// Thin protocol wrapper around a [`PlatformAuthenticator`].
#[derive(Debug)]
pub struct CredentialBroker<A> {
    authenticator: A,
}

impl<A: PlatformAuthenticator> CredentialBroker<A> {
    /// Wraps `authenticator`.
    #[must_use]
    pub const fn new(authenticator: A) -> Self {
        Self { authenticator }
    }

    /// The wrapped authenticator.
    #[must_use]
    pub const fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Creates a credential that must support the large-blob extension.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAuthenticator` if the credential does not report large-blob support.
    /// - `Ceremony` if the ceremony fails or is declined.
    pub async fn create_credential(
        &self,
        rp_name: &str,
        user: UserEntity,
    ) -> PasskeyResult<Credential> {
        log::debug!("requesting credential creation for rp {rp_name}");
        let created = self
            .authenticator
            .create(CreationOptions {
                rp_name: rp_name.to_string(),
                user,
                challenge: CEREMONY_CHALLENGE.to_vec(),
                algorithms: PUBLIC_KEY_ALGORITHMS.to_vec(),
                large_blob: LargeBlobSupport::Required,
            })
            .await
            .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;

        if created.large_blob_supported != Some(true) {
            log::warn!("authenticator created a credential without large-blob support");
            return Err(PasskeyError::UnsupportedAuthenticator);
        }

        Ok(Credential::new(created.raw_id))
    }

    /// Reads the key stored in a credential's large blob.
    ///
    /// With `credential_id == None` the user may pick any credential
    /// registered for this relying party.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAuthenticator` if no large-blob output is reported.
    /// - `InvalidCredential` if no blob is stored or it is not a valid key.
    /// - `Ceremony` if the ceremony fails or is declined.
    pub async fn read_key(
        &self,
        credential_id: Option<&[u8]>,
    ) -> PasskeyResult<(Credential, RawKey)> {
        log::debug!(
            "requesting large-blob read ({})",
            if credential_id.is_some() { "allow-listed" } else { "discoverable" }
        );
        let response = self
            .authenticator
            .get(AssertionOptions {
                allow_credential: credential_id.map(<[u8]>::to_vec),
                challenge: CEREMONY_CHALLENGE.to_vec(),
                mediation: Mediation::Required,
                large_blob: LargeBlobRequest::Read,
            })
            .await
            .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;

        let output = response
            .large_blob
            .ok_or(PasskeyError::UnsupportedAuthenticator)?;
        let blob = output.blob.ok_or_else(|| {
            PasskeyError::InvalidCredential("no key is bound to this credential".to_string())
        })?;
        let key = RawKey::from_bytes(&blob)?;

        Ok((Credential::new(response.raw_id), key))
    }

    /// Writes `key` into the large blob of `credential_id`.
    ///
    /// # Errors
    ///
    /// - `KeyStoreWriteFailed` if the authenticator does not confirm the write.
    /// - `Ceremony` if the ceremony fails or is declined.
    pub async fn write_key(&self, credential_id: &[u8], key: &RawKey) -> PasskeyResult<Credential> {
        log::debug!("requesting large-blob write");
        let response = self
            .authenticator
            .get(AssertionOptions {
                allow_credential: Some(credential_id.to_vec()),
                challenge: CEREMONY_CHALLENGE.to_vec(),
                mediation: Mediation::Optional,
                large_blob: LargeBlobRequest::Write(Zeroizing::new(key.expose_bytes().to_vec())),
            })
            .await
            .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;

        let written = response
            .large_blob
            .and_then(|output| output.written)
            .unwrap_or(false);
        if !written {
            log::warn!("authenticator did not commit the large-blob write");
            return Err(PasskeyError::KeyStoreWriteFailed);
        }

        Ok(Credential::new(response.raw_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::memory::{MemoryAuthenticator, MemoryCredential};
    use crate::config::RegisterArgs;

    fn user() -> UserEntity {
        RegisterArgs::default().user()
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let broker = CredentialBroker::new(MemoryAuthenticator::new());
        let credential = broker.create_credential("app", user()).await.unwrap();

        let key = RawKey::generate();
        let written = broker.write_key(credential.raw_id(), &key).await.unwrap();
        assert_eq!(written, credential);

        let (read_credential, read_key) = broker.read_key(Some(credential.raw_id())).await.unwrap();
        assert_eq!(read_credential, credential);
        assert_eq!(read_key.expose_bytes(), key.expose_bytes());

        let (discovered, _) = broker.read_key(None).await.unwrap();
        assert_eq!(discovered, credential);
    }

    #[tokio::test]
    async fn test_create_without_large_blob_is_unsupported() {
        let broker = CredentialBroker::new(MemoryAuthenticator::without_large_blob());
        let result = broker.create_credential("app", user()).await;
        assert!(matches!(result, Err(PasskeyError::UnsupportedAuthenticator)));
    }

    #[tokio::test]
    async fn test_read_without_extension_output_is_unsupported() {
        let authenticator = MemoryAuthenticator::new();
        let broker = CredentialBroker::new(authenticator);
        let credential = broker.create_credential("app", user()).await.unwrap();
        broker.authenticator().set_large_blob_supported(false);

        let result = broker.read_key(Some(credential.raw_id())).await;
        assert!(matches!(result, Err(PasskeyError::UnsupportedAuthenticator)));
    }

    #[tokio::test]
    async fn test_read_bare_passkey_is_invalid_credential() {
        let authenticator = MemoryAuthenticator::new();
        authenticator.insert_credential(MemoryCredential {
            raw_id: vec![7; 16],
            rp_name: "another app".to_string(),
            user: user(),
            blob: None,
        });
        let broker = CredentialBroker::new(authenticator);

        let result = broker.read_key(None).await;
        assert!(matches!(result, Err(PasskeyError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let broker = CredentialBroker::new(MemoryAuthenticator::new());
        let credential = broker.create_credential("app", user()).await.unwrap();
        broker.authenticator().set_fail_writes(true);

        let result = broker.write_key(credential.raw_id(), &RawKey::generate()).await;
        assert!(matches!(result, Err(PasskeyError::KeyStoreWriteFailed)));
        assert!(broker.authenticator().blob(credential.raw_id()).is_none());
    }

    #[tokio::test]
    async fn test_decline_surfaces_as_ceremony_error() {
        let broker = CredentialBroker::new(MemoryAuthenticator::new());
        broker.authenticator().set_decline(true);

        let result = broker.create_credential("app", user()).await;
        assert!(matches!(result, Err(PasskeyError::Ceremony(_))));
    }

    #[test]
    fn test_credential_base64_round_trip() {
        let credential = Credential::new(vec![0xfb, 0xff, 0x00, 0x10]);
        assert_eq!(credential.id_base64(), "+/8AEA==");
        assert_eq!(Credential::from_base64("+/8AEA==").unwrap(), credential);
        assert!(Credential::from_base64("not base64!").is_err());
    }
}
