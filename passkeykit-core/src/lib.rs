//! Passkey-backed Ethereum wallet.
//!
//! A random secp256k1 key is stored inside a passkey's large-blob extension
//! and read back through an authenticator ceremony on login. Sessions are
//! persisted in two key-value tiers and, depending on [`SessionType`], either
//! keep the key in memory or recover it for every signature.
//!
//! Platform services are reached only through traits:
//! [`authenticator::PlatformAuthenticator`], [`storage::KeyValueStore`] and
//! [`clock::Clock`].

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::future_not_send, clippy::module_name_repetitions)]

pub mod account;
pub mod authenticator;
pub mod broker;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod logger;
pub mod sandbox;
pub mod session;
pub mod storage;

pub use account::{Account, AccountVariant, SignPayload};
pub use alloy::dyn_abi::TypedData;
pub use broker::{Credential, CredentialBroker};
pub use config::{RegisterArgs, SessionOptions, SessionType};
pub use error::{PasskeyError, PasskeyResult};
pub use key::RawKey;
pub use lifecycle::{LifecycleState, SessionLifecycle};
pub use session::{Session, SessionRecord, SessionStore};
