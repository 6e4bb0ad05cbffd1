//! Caller-facing configuration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{DEFAULT_RP_NAME, DEFAULT_SESSION_TIMEOUT_MS, DEFAULT_USER_ID, DEFAULT_USER_NAME};

/// Where the raw key may live while a session is active.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionType {
    /// Least secure, best UX.
    ///
    /// The raw key is kept in the ephemeral (tab-scoped) tier for the whole
    /// session. Signing and export never prompt. A new tab must log in again.
    #[default]
    Session,
    /// Most secure, worst UX.
    ///
    /// The raw key is never persisted outside the authenticator. Every
    /// signature and export re-reads it through a ceremony and drops it.
    Passkey,
}

/// Options selecting the session mode and its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Session mode; `session` when omitted.
    #[serde(default)]
    pub session_type: SessionType,
    /// Time before requiring the user to log back in.
    #[serde(default = "default_timeout")]
    pub session_timeout_ms: u64,
}

impl SessionOptions {
    /// Options for `session_type` with the default timeout.
    #[must_use]
    pub const fn new(session_type: SessionType) -> Self {
        Self {
            session_type,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }

    /// Overrides the session timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, session_timeout_ms: u64) -> Self {
        self.session_timeout_ms = session_timeout_ms;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(SessionType::default())
    }
}

const fn default_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

/// Metadata for a new credential. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterArgs {
    /// Name shown by the authenticator for the user.
    pub display_name: Option<String>,
    /// User handle bytes.
    pub id: Option<Vec<u8>>,
    /// Account name.
    pub name: Option<String>,
    /// Relying party name.
    pub app_name: Option<String>,
}

impl RegisterArgs {
    /// Arguments carrying only the relying party name.
    #[must_use]
    pub fn for_app(app_name: impl Into<String>) -> Self {
        Self {
            app_name: Some(app_name.into()),
            ..Self::default()
        }
    }

    pub(crate) fn rp_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(DEFAULT_RP_NAME)
    }

    pub(crate) fn user(&self) -> crate::authenticator::UserEntity {
        crate::authenticator::UserEntity {
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            id: self.id.clone().unwrap_or_else(|| DEFAULT_USER_ID.to_vec()),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    #[test_case("session", SessionType::Session)]
    #[test_case("passkey", SessionType::Passkey)]
    fn test_session_type_from_str(input: &str, expected: SessionType) {
        assert_eq!(SessionType::from_str(input).unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn test_session_type_rejects_unknown() {
        assert!(SessionType::from_str("cookie").is_err());
    }

    #[test]
    fn test_options_default_timeout_is_three_hours() {
        let options: SessionOptions =
            serde_json::from_str(r#"{"sessionType":"passkey"}"#).unwrap();
        assert_eq!(options.session_type, SessionType::Passkey);
        assert_eq!(options.session_timeout_ms, 10_800_000);
    }

    #[test]
    fn test_options_default_session_type() {
        let options: SessionOptions = serde_json::from_str(r#"{"sessionTimeoutMs":1}"#).unwrap();
        assert_eq!(options, SessionOptions::new(SessionType::Session).with_timeout_ms(1));
    }

    #[test]
    fn test_register_args_defaults() {
        let args = RegisterArgs::for_app("W");
        assert_eq!(args.rp_name(), "W");
        let user = args.user();
        assert_eq!(user.display_name, "anonymous_user");
        assert_eq!(user.name, "anonymous_user");
        assert_eq!(user.id, b"anonymous_user".to_vec());
        assert_eq!(RegisterArgs::default().rp_name(), "app");
    }
}
