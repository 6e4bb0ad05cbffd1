//! Wire format of the sandbox protocol.
//!
//! Requests are JSON objects tagged by `type`; every response carries
//! `success`, and on failure a stringified `error`.

use std::str::FromStr;

use alloy::dyn_abi::TypedData;
use alloy_primitives::{Address, Signature, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::account::SignPayload;
use crate::config::{RegisterArgs, SessionOptions, SessionType};
use crate::defaults::DEFAULT_SESSION_TIMEOUT_MS;
use crate::error::{PasskeyError, PasskeyResult};
use crate::session::SessionRecord;

/// Value of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequestType {
    /// Check a session and return its public fields.
    Get,
    /// Create a credential, bind a new key to it and log in.
    Register,
    /// Log in with an existing credential.
    Login,
    /// End the session.
    Logout,
    /// Sign with the session's account.
    Sign,
    /// Return the session's raw key.
    Export,
}

/// A request naming an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthedRequest {
    /// Session token returned by `register` or `login`.
    pub session_id: String,
}

/// `register` request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Session mode for the new session.
    pub session_type: SessionType,
    /// Session lifetime; defaults to three hours.
    pub session_timeout_ms: Option<u64>,
    /// Relying party name.
    pub app_name: Option<String>,
    /// User display name.
    pub display_name: Option<String>,
    /// Account name.
    pub name: Option<String>,
}

impl RegisterRequest {
    /// Session options requested.
    #[must_use]
    pub fn options(&self) -> SessionOptions {
        SessionOptions::new(self.session_type)
            .with_timeout_ms(self.session_timeout_ms.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS))
    }

    /// Credential metadata requested.
    #[must_use]
    pub fn args(&self) -> RegisterArgs {
        RegisterArgs {
            display_name: self.display_name.clone(),
            id: None,
            name: self.name.clone(),
            app_name: self.app_name.clone(),
        }
    }
}

/// `login` request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Session mode for the new session.
    pub session_type: SessionType,
    /// Session lifetime; defaults to three hours.
    pub session_timeout_ms: Option<u64>,
    /// Base64 credential id to restrict the ceremony to.
    pub requested_credential_id: Option<String>,
}

impl LoginRequest {
    /// Session options requested.
    #[must_use]
    pub fn options(&self) -> SessionOptions {
        SessionOptions::new(self.session_type)
            .with_timeout_ms(self.session_timeout_ms.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS))
    }
}

/// `logout` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Session being ended; informational only.
    pub session_id: Option<String>,
}

/// Payload of a `sign` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum WireSignPayload {
    /// Hex bytes to sign as an EIP-191 personal message.
    Message(String),
    /// Hex 32-byte digest to sign as is.
    Hash(String),
    /// EIP-712 typed data, in `eth_signTypedData_v4` JSON form.
    TypedData(Box<TypedData>),
}

impl TryFrom<&WireSignPayload> for SignPayload {
    type Error = PasskeyError;

    fn try_from(payload: &WireSignPayload) -> Result<Self, Self::Error> {
        match payload {
            WireSignPayload::Message(data) => Ok(Self::Message(decode_hex(data, "payload")?)),
            WireSignPayload::Hash(data) => {
                let bytes = decode_hex(data, "payload")?;
                if bytes.len() != 32 {
                    return Err(PasskeyError::InvalidInput {
                        attribute: "payload".to_string(),
                        reason: format!("hash must be 32 bytes, got {}", bytes.len()),
                    });
                }
                Ok(Self::Hash(B256::from_slice(&bytes)))
            }
            WireSignPayload::TypedData(typed_data) => Ok(Self::TypedData(typed_data.clone())),
        }
    }
}

/// `sign` request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Session token.
    pub session_id: String,
    /// What to sign.
    pub payload: WireSignPayload,
}

/// A parsed sandbox request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `get`
    Get(AuthedRequest),
    /// `register`
    Register(RegisterRequest),
    /// `login`
    Login(LoginRequest),
    /// `logout`
    Logout(LogoutRequest),
    /// `sign`
    Sign(SignRequest),
    /// `export`
    Export(AuthedRequest),
}

impl Request {
    /// Parses a posted message.
    ///
    /// # Errors
    ///
    /// - `UnknownMessage` if `type` is missing or not recognized.
    /// - `Serialization` if the body does not match the request type.
    pub fn parse(data: &Value) -> PasskeyResult<Self> {
        let name = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| PasskeyError::UnknownMessage("missing type".to_string()))?;
        let request_type = RequestType::from_str(name)
            .map_err(|_| PasskeyError::UnknownMessage(name.to_string()))?;

        let body = data.clone();
        Ok(match request_type {
            RequestType::Get => Self::Get(serde_json::from_value(body)?),
            RequestType::Register => Self::Register(serde_json::from_value(body)?),
            RequestType::Login => Self::Login(serde_json::from_value(body)?),
            RequestType::Logout => Self::Logout(serde_json::from_value(body)?),
            RequestType::Sign => Self::Sign(serde_json::from_value(body)?),
            RequestType::Export => Self::Export(serde_json::from_value(body)?),
        })
    }

    /// The request's `type`.
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        match self {
            Self::Get(_) => RequestType::Get,
            Self::Register(_) => RequestType::Register,
            Self::Login(_) => RequestType::Login,
            Self::Logout(_) => RequestType::Logout,
            Self::Sign(_) => RequestType::Sign,
            Self::Export(_) => RequestType::Export,
        }
    }
}

/// Reply posted back to the opener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,
    /// Stringified failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Base64 credential id (`get`, `register`, `login`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    /// Wallet address (`get`, `register`, `login`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// 65-byte `r || s || v` signature, hex encoded (`sign`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Hex encoded raw key (`export`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl Response {
    /// Success without a body.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Success carrying a session's public fields.
    #[must_use]
    pub fn credentials(record: &SessionRecord) -> Self {
        Self {
            success: true,
            session_id: Some(record.session_id.clone()),
            credential_id: Some(record.credential_id.clone()),
            address: Some(record.address),
            ..Self::default()
        }
    }

    /// Success carrying a signature.
    #[must_use]
    pub fn signature(session_id: &str, signature: &Signature) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.to_string()),
            signature: Some(format!("0x{}", hex::encode(signature.as_bytes()))),
            ..Self::default()
        }
    }

    /// Success carrying an exported key.
    #[must_use]
    pub fn private_key(session_id: &str, private_key: String) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.to_string()),
            private_key: Some(private_key),
            ..Self::default()
        }
    }

    /// Failure flattened to a string.
    #[must_use]
    pub fn failure(error: &PasskeyError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

fn decode_hex(data: &str, attribute: &str) -> PasskeyResult<Vec<u8>> {
    hex::decode(data.strip_prefix("0x").unwrap_or(data)).map_err(|e| PasskeyError::InvalidInput {
        attribute: attribute.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_parse_register() {
        let request = Request::parse(&json!({
            "type": "register",
            "sessionType": "passkey",
            "appName": "W",
        }))
        .unwrap();
        let Request::Register(register) = request else {
            panic!("expected register");
        };
        assert_eq!(register.options(), SessionOptions::new(SessionType::Passkey));
        assert_eq!(register.args(), RegisterArgs::for_app("W"));
    }

    #[test]
    fn test_parse_login_with_credential() {
        let request = Request::parse(&json!({
            "type": "login",
            "sessionType": "session",
            "sessionTimeoutMs": 60000,
            "requestedCredentialId": "AQID",
        }))
        .unwrap();
        assert_eq!(request.request_type(), RequestType::Login);
        let Request::Login(login) = request else {
            panic!("expected login");
        };
        assert_eq!(login.options().session_timeout_ms, 60_000);
        assert_eq!(login.requested_credential_id.as_deref(), Some("AQID"));
    }

    #[test]
    fn test_parse_sign_payloads() {
        let request = Request::parse(&json!({
            "type": "sign",
            "sessionId": "s",
            "payload": { "kind": "hash", "data": format!("0x{}", "11".repeat(32)) },
        }))
        .unwrap();
        let Request::Sign(sign) = request else {
            panic!("expected sign");
        };
        assert_eq!(
            SignPayload::try_from(&sign.payload).unwrap(),
            SignPayload::Hash(B256::repeat_byte(0x11))
        );

        let short = WireSignPayload::Hash("0x1122".to_string());
        assert!(matches!(
            SignPayload::try_from(&short),
            Err(PasskeyError::InvalidInput { .. })
        ));
        let message = WireSignPayload::Message("0x6869".to_string());
        assert_eq!(
            SignPayload::try_from(&message).unwrap(),
            SignPayload::Message(b"hi".to_vec())
        );
    }

    #[test]
    fn test_parse_typed_data_payload() {
        let request = Request::parse(&json!({
            "type": "sign",
            "sessionId": "s",
            "payload": {
                "kind": "typedData",
                "data": {
                    "types": {
                        "EIP712Domain": [{ "name": "name", "type": "string" }],
                        "Greeting": [{ "name": "text", "type": "string" }]
                    },
                    "primaryType": "Greeting",
                    "domain": { "name": "W" },
                    "message": { "text": "hi" }
                }
            },
        }))
        .unwrap();
        let Request::Sign(sign) = request else {
            panic!("expected sign");
        };
        let SignPayload::TypedData(typed_data) = SignPayload::try_from(&sign.payload).unwrap()
        else {
            panic!("expected typed data");
        };
        assert_eq!(typed_data.primary_type, "Greeting");
        assert!(typed_data.eip712_signing_hash().is_ok());
    }

    #[test_case(json!({ "type": "transfer" }) ; "unrecognized type")]
    #[test_case(json!({ "sessionId": "s" }) ; "missing type")]
    #[test_case(json!({ "type": 7 }) ; "non-string type")]
    fn test_parse_unknown_message(data: Value) {
        assert!(matches!(Request::parse(&data), Err(PasskeyError::UnknownMessage(_))));
    }

    #[test]
    fn test_parse_missing_session_id_is_rejected() {
        assert!(matches!(
            Request::parse(&json!({ "type": "export" })),
            Err(PasskeyError::Serialization(_))
        ));
    }

    #[test]
    fn test_failure_response_shape() {
        let value = serde_json::to_value(Response::failure(&PasskeyError::NotAuthenticated)).unwrap();
        assert_eq!(value, json!({ "success": false, "error": "not_authenticated" }));

        let value = serde_json::to_value(Response::ok()).unwrap();
        assert_eq!(value, json!({ "success": true }));
    }
}
