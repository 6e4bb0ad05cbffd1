//! Raw private key handling.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroizing;

use crate::defaults::RAW_KEY_LEN;
use crate::error::{PasskeyError, PasskeyResult};

/// A secp256k1 private scalar.
///
/// The bytes are zeroized on drop and never printed by `Debug`. A `RawKey` is
/// never part of a serializable type: it is either held for the duration of
/// one ceremony or written, hex encoded, to the ephemeral storage tier.
pub struct RawKey(SecretBox<[u8; RAW_KEY_LEN]>);

impl std::fmt::Debug for RawKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawKey").finish_non_exhaustive()
    }
}

impl RawKey {
    /// Generates a fresh key from OS randomness.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let mut bytes = Zeroizing::new([0u8; RAW_KEY_LEN]);
            OsRng.fill_bytes(&mut bytes[..]);
            // Rejects the zero scalar and values above the curve order.
            if let Ok(key) = Self::from_bytes(&bytes[..]) {
                return key;
            }
        }
    }

    /// Parses a key from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` if `bytes` is not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8]) -> PasskeyResult<Self> {
        if bytes.len() != RAW_KEY_LEN {
            return Err(PasskeyError::InvalidCredential(format!(
                "key length mismatch: expected {RAW_KEY_LEN}, got {}",
                bytes.len()
            )));
        }
        PrivateKeySigner::from_slice(bytes)
            .map_err(|_| PasskeyError::InvalidCredential("key is not a valid scalar".to_string()))?;

        let mut secret = Box::new([0u8; RAW_KEY_LEN]);
        secret.copy_from_slice(bytes);
        Ok(Self(SecretBox::new(secret)))
    }

    /// Parses a `0x`-prefixed (or bare) hex encoded key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` if the string is not hex or not a valid key.
    pub fn from_hex(encoded: &str) -> PasskeyResult<Self> {
        let digits = encoded.strip_prefix("0x").unwrap_or(encoded);
        let bytes = Zeroizing::new(
            hex::decode(digits)
                .map_err(|e| PasskeyError::InvalidCredential(format!("key is not hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Returns the `0x`-prefixed lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.0.expose_secret())))
    }

    /// Returns the raw bytes. Treat this as sensitive material.
    #[must_use]
    pub fn expose_bytes(&self) -> &[u8; RAW_KEY_LEN] {
        self.0.expose_secret()
    }

    /// Copies the key into a new handle.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self(SecretBox::new(Box::new(*self.0.expose_secret())))
    }

    /// Builds a signer from this key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` if the key is not a valid scalar.
    pub fn signer(&self) -> PasskeyResult<PrivateKeySigner> {
        PrivateKeySigner::from_bytes(&B256::from(*self.0.expose_secret()))
            .map_err(|_| PasskeyError::InvalidCredential("key is not a valid scalar".to_string()))
    }

    /// Address derived from this key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` if the key is not a valid scalar.
    pub fn address(&self) -> PasskeyResult<Address> {
        Ok(self.signer()?.address())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    // Well-known development key (anvil account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derivation() {
        let key = RawKey::from_hex(DEV_KEY).unwrap();
        assert_eq!(
            key.address().unwrap(),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert_eq!(key.to_hex().as_str(), DEV_KEY);
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = RawKey::generate();
        let b = RawKey::generate();
        assert_ne!(a.expose_bytes(), b.expose_bytes());
        assert_eq!(a.duplicate().expose_bytes(), a.expose_bytes());
    }

    #[test]
    fn test_rejects_invalid_keys() {
        assert!(matches!(
            RawKey::from_bytes(&[1u8; 31]),
            Err(PasskeyError::InvalidCredential(_))
        ));
        assert!(matches!(
            RawKey::from_bytes(&[0u8; 32]),
            Err(PasskeyError::InvalidCredential(_))
        ));
        assert!(matches!(
            RawKey::from_hex("0xzz"),
            Err(PasskeyError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = RawKey::from_hex(DEV_KEY).unwrap();
        assert!(!format!("{key:?}").contains("ac0974"));
    }
}
