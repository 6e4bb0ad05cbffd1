//! Protocol constants shared by every ceremony.

/// Default time before the user must log back in: three hours.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 3 * 60 * 60 * 1000;

/// Relying party name used when the caller does not provide one.
pub const DEFAULT_RP_NAME: &str = "app";

/// User display name and account name used when the caller does not provide one.
pub const DEFAULT_USER_NAME: &str = "anonymous_user";

/// User handle used when the caller does not provide one.
pub const DEFAULT_USER_ID: &[u8] = b"anonymous_user";

/// Challenge sent with every ceremony.
///
/// Assertions are never verified by a server here; only the large-blob
/// extension output is consumed.
pub const CEREMONY_CHALLENGE: &[u8] = b"challenge";

/// COSE algorithms offered at registration: `EdDSA`, `ES256`, `RS256`.
pub const PUBLIC_KEY_ALGORITHMS: [i32; 3] = [-8, -7, -257];

/// Length in bytes of a raw secp256k1 private key.
pub const RAW_KEY_LEN: usize = 32;
