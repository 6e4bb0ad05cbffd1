//! Signing capabilities bound to a session.
//!
//! [`Account`] is chosen once, when the session is created, from the
//! configured [`SessionType`]:
//!
//! - [`Account::Cached`] holds the key in memory and signs immediately.
//! - [`Account::Refetching`] holds only the address and credential id and
//!   recovers the key from the authenticator for every single operation.

use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{Address, Signature, B256};

use crate::authenticator::PlatformAuthenticator;
use crate::broker::{Credential, CredentialBroker};
use crate::config::SessionType;
use crate::error::{PasskeyError, PasskeyResult};
use crate::key::RawKey;

/// Which variant an [`Account`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountVariant {
    /// Key resident in memory.
    Cached,
    /// Key re-read from the authenticator on every operation.
    Refetching,
}

/// What to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignPayload {
    /// Arbitrary bytes, signed as an EIP-191 personal message.
    Message(Vec<u8>),
    /// A precomputed 32-byte digest, e.g. a transaction signing hash.
    Hash(B256),
    /// EIP-712 typed structured data.
    TypedData(Box<TypedData>),
}

/// Account whose key is resident for the whole session.
pub struct CachedAccount {
    key: RawKey,
    signer: PrivateKeySigner,
    credential: Credential,
}

impl std::fmt::Debug for CachedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAccount")
            .field("address", &self.signer.address())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

/// Account that recovers its key through a ceremony for each operation.
#[derive(Debug)]
pub struct RefetchingAccount<A> {
    address: Address,
    credential: Credential,
    broker: Arc<CredentialBroker<A>>,
}

impl<A: PlatformAuthenticator> RefetchingAccount<A> {
    /// Reads the key back and checks it still derives this account's address.
    ///
    /// The key is returned to the caller and never stored.
    async fn retrieve(&self) -> PasskeyResult<RawKey> {
        let (_, key) = self.broker.read_key(Some(self.credential.raw_id())).await?;
        let found = key.address()?;
        if found != self.address {
            return Err(PasskeyError::AccountAddressMismatch {
                expected: self.address,
                found,
            });
        }
        Ok(key)
    }
}

/// Signing capability of a session.
#[derive(Debug)]
pub enum Account<A> {
    /// See [`CachedAccount`].
    Cached(CachedAccount),
    /// See [`RefetchingAccount`].
    Refetching(RefetchingAccount<A>),
}

impl<A: PlatformAuthenticator> Account<A> {
    /// Builds the account variant for `session_type`.
    ///
    /// `key` is required for [`SessionType::Session`] and dropped for
    /// [`SessionType::Passkey`].
    ///
    /// # Errors
    ///
    /// - `InvalidCredential` if a cached account has no key.
    /// - `AccountAddressMismatch` if the key does not derive `address`.
    pub fn new(
        session_type: SessionType,
        key: Option<RawKey>,
        address: Address,
        credential: Credential,
        broker: Arc<CredentialBroker<A>>,
    ) -> PasskeyResult<Self> {
        match session_type {
            SessionType::Session => {
                let key = key.ok_or_else(|| {
                    PasskeyError::InvalidCredential("cached account requires a key".to_string())
                })?;
                let signer = key.signer()?;
                if signer.address() != address {
                    return Err(PasskeyError::AccountAddressMismatch {
                        expected: address,
                        found: signer.address(),
                    });
                }
                Ok(Self::Cached(CachedAccount {
                    key,
                    signer,
                    credential,
                }))
            }
            SessionType::Passkey => {
                if let Some(key) = key {
                    let found = key.address()?;
                    if found != address {
                        return Err(PasskeyError::AccountAddressMismatch {
                            expected: address,
                            found,
                        });
                    }
                }
                Ok(Self::Refetching(RefetchingAccount {
                    address,
                    credential,
                    broker,
                }))
            }
        }
    }

    /// Wallet address.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::Cached(account) => account.signer.address(),
            Self::Refetching(account) => account.address,
        }
    }

    /// Credential the key is bound to.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        match self {
            Self::Cached(account) => &account.credential,
            Self::Refetching(account) => &account.credential,
        }
    }

    /// Which variant this is.
    #[must_use]
    pub const fn variant(&self) -> AccountVariant {
        match self {
            Self::Cached(_) => AccountVariant::Cached,
            Self::Refetching(_) => AccountVariant::Refetching,
        }
    }

    /// Signs `payload`.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if signing fails; a refetching account also returns
    /// any error of [`CredentialBroker::read_key`] or `AccountAddressMismatch`.
    pub async fn sign(&self, payload: &SignPayload) -> PasskeyResult<Signature> {
        match self {
            Self::Cached(account) => sign_with(&account.signer, payload),
            Self::Refetching(account) => {
                let key = account.retrieve().await?;
                sign_with(&key.signer()?, payload)
            }
        }
    }

    /// Signs `message` as an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// See [`Account::sign`].
    pub async fn sign_message(&self, message: &[u8]) -> PasskeyResult<Signature> {
        self.sign(&SignPayload::Message(message.to_vec())).await
    }

    /// Signs a precomputed digest.
    ///
    /// # Errors
    ///
    /// See [`Account::sign`].
    pub async fn sign_hash(&self, hash: &B256) -> PasskeyResult<Signature> {
        self.sign(&SignPayload::Hash(*hash)).await
    }

    /// Signs EIP-712 typed data.
    ///
    /// # Errors
    ///
    /// See [`Account::sign`].
    pub async fn sign_typed_data(&self, typed_data: &TypedData) -> PasskeyResult<Signature> {
        self.sign(&SignPayload::TypedData(Box::new(typed_data.clone())))
            .await
    }

    /// Returns a copy of the raw key.
    ///
    /// # Errors
    ///
    /// A refetching account returns any error of
    /// [`CredentialBroker::read_key`] or `AccountAddressMismatch`.
    pub async fn export_key(&self) -> PasskeyResult<RawKey> {
        match self {
            Self::Cached(account) => Ok(account.key.duplicate()),
            Self::Refetching(account) => account.retrieve().await,
        }
    }
}

fn sign_with(signer: &PrivateKeySigner, payload: &SignPayload) -> PasskeyResult<Signature> {
    let signature = match payload {
        SignPayload::Message(message) => signer.sign_message_sync(message),
        SignPayload::Hash(hash) => signer.sign_hash_sync(hash),
        SignPayload::TypedData(typed_data) => signer.sign_dynamic_typed_data_sync(typed_data),
    };
    signature.map_err(|e| PasskeyError::Signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::memory::MemoryAuthenticator;
    use crate::config::RegisterArgs;
    use test_case::test_case;

    fn mail_typed_data() -> TypedData {
        serde_json::from_value(serde_json::json!({
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
        }))
        .unwrap()
    }

    async fn bound_key() -> (Arc<CredentialBroker<MemoryAuthenticator>>, Credential, RawKey) {
        let broker = Arc::new(CredentialBroker::new(MemoryAuthenticator::new()));
        let credential = broker
            .create_credential("app", RegisterArgs::default().user())
            .await
            .unwrap();
        let key = RawKey::generate();
        broker.write_key(credential.raw_id(), &key).await.unwrap();
        (broker, credential, key)
    }

    #[tokio::test]
    async fn test_cached_account_signs_without_ceremony() {
        let (broker, credential, key) = bound_key().await;
        let address = key.address().unwrap();
        let account =
            Account::new(SessionType::Session, Some(key), address, credential, broker.clone())
                .unwrap();
        assert_eq!(account.variant(), AccountVariant::Cached);

        let reads_before = broker.authenticator().read_count();
        let signature = account.sign_message(b"hello").await.unwrap();
        assert_eq!(
            signature.recover_address_from_msg(b"hello").unwrap(),
            address
        );
        account.export_key().await.unwrap();
        assert_eq!(broker.authenticator().read_count(), reads_before);
    }

    #[tokio::test]
    async fn test_refetching_account_reads_key_every_time() {
        let (broker, credential, key) = bound_key().await;
        let address = key.address().unwrap();
        let account =
            Account::new(SessionType::Passkey, Some(key), address, credential, broker.clone())
                .unwrap();
        assert_eq!(account.variant(), AccountVariant::Refetching);

        let hash = B256::repeat_byte(0x42);
        let signature = account.sign_hash(&hash).await.unwrap();
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), address);
        account.sign_message(b"again").await.unwrap();
        let exported = account.export_key().await.unwrap();
        assert_eq!(exported.address().unwrap(), address);

        assert_eq!(broker.authenticator().read_count(), 3);
    }

    #[tokio::test]
    async fn test_refetching_account_detects_rebound_credential() {
        let (broker, credential, key) = bound_key().await;
        let address = key.address().unwrap();
        let account =
            Account::new(SessionType::Passkey, None, address, credential.clone(), broker.clone())
                .unwrap();

        broker
            .write_key(credential.raw_id(), &RawKey::generate())
            .await
            .unwrap();

        let result = account.sign_message(b"hello").await;
        assert!(matches!(
            result,
            Err(PasskeyError::AccountAddressMismatch { expected, .. }) if expected == address
        ));
    }

    #[tokio::test]
    async fn test_cached_account_requires_matching_key() {
        let (broker, credential, key) = bound_key().await;
        let address = key.address().unwrap();

        let missing =
            Account::new(SessionType::Session, None, address, credential.clone(), broker.clone());
        assert!(matches!(missing, Err(PasskeyError::InvalidCredential(_))));

        let other = Account::new(
            SessionType::Session,
            Some(RawKey::generate()),
            address,
            credential,
            broker,
        );
        assert!(matches!(other, Err(PasskeyError::AccountAddressMismatch { .. })));
    }

    #[test_case(SessionType::Session, 0 ; "cached")]
    #[test_case(SessionType::Passkey, 1 ; "refetching")]
    #[tokio::test]
    async fn test_typed_data_signature_recovers_address(session_type: SessionType, reads: usize) {
        let (broker, credential, key) = bound_key().await;
        let address = key.address().unwrap();
        let account =
            Account::new(session_type, Some(key), address, credential, broker.clone()).unwrap();

        let typed_data = mail_typed_data();
        let signature = account.sign_typed_data(&typed_data).await.unwrap();
        let hash = typed_data.eip712_signing_hash().unwrap();
        assert_eq!(
            hash,
            "0xbe609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
                .parse::<B256>()
                .unwrap()
        );
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), address);
        assert_eq!(broker.authenticator().read_count(), reads);
    }
}
