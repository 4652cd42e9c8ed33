//! URL-safe, tamper-evident encoding for confirmation payloads.
//!
//! Format: `base64url(json(payload)) "." base64url(hmac_sha256(key, first_part))`.
//! Both parts are unpadded so the result can be dropped into a query string
//! without escaping.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_KEY_LENGTH: usize = 32;

/// Identity plus the backend activation token, signed into the email link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPayload {
    #[serde(rename = "email")]
    pub normalized_email: String,
    #[serde(rename = "token")]
    pub activation_token: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token key must be at least 32 bytes")]
    KeyTooShort,
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid signature")]
    Signature,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

pub trait SecureTokenCodec: Send + Sync {
    /// Encode a payload into an opaque, URL-safe string.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    fn encode(&self, payload: &ConfirmationPayload) -> Result<String, TokenError>;

    /// Reverse [`SecureTokenCodec::encode`], rejecting anything that was altered.
    ///
    /// # Errors
    /// Returns an error for malformed input or a signature mismatch.
    fn decode(&self, token: &str) -> Result<ConfirmationPayload, TokenError>;
}

/// HMAC-SHA256 signed codec keyed by the configured token secret.
pub struct HmacTokenCodec {
    key: SecretString,
}

impl HmacTokenCodec {
    /// # Errors
    /// Returns [`TokenError::KeyTooShort`] when the key has fewer than 32 bytes.
    pub fn new(key: SecretString) -> Result<Self, TokenError> {
        if key.expose_secret().len() < MIN_KEY_LENGTH {
            return Err(TokenError::KeyTooShort);
        }
        Ok(Self { key })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|_| TokenError::KeyTooShort)
    }
}

impl std::fmt::Debug for HmacTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenCodec")
            .field("key", &"***")
            .finish()
    }
}

impl SecureTokenCodec for HmacTokenCodec {
    fn encode(&self, payload: &ConfirmationPayload) -> Result<String, TokenError> {
        let json = serde_json::to_vec(payload)?;
        let body = Base64UrlUnpadded::encode_string(&json);

        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        let tag = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{body}.{tag}"))
    }

    fn decode(&self, token: &str) -> Result<ConfirmationPayload, TokenError> {
        let (body, tag) = token.trim().split_once('.').ok_or(TokenError::Format)?;
        if body.is_empty() || tag.is_empty() || tag.contains('.') {
            return Err(TokenError::Format);
        }

        let tag = Base64UrlUnpadded::decode_vec(tag).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&tag).map_err(|_| TokenError::Signature)?;

        let json = Base64UrlUnpadded::decode_vec(body).map_err(|_| TokenError::Base64)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn codec() -> Result<HmacTokenCodec> {
        Ok(HmacTokenCodec::new(SecretString::from(KEY.to_string()))?)
    }

    fn payload() -> ConfirmationPayload {
        ConfirmationPayload {
            normalized_email: "a@b.com".to_string(),
            activation_token: "abc".to_string(),
        }
    }

    #[test]
    fn decode_reverses_encode() -> Result<()> {
        let codec = codec()?;
        let encoded = codec.encode(&payload())?;
        assert_eq!(codec.decode(&encoded)?, payload());
        Ok(())
    }

    #[test]
    fn encoded_token_is_url_safe() -> Result<()> {
        let encoded = codec()?.encode(&payload())?;
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
        Ok(())
    }

    #[test]
    fn short_key_is_rejected() {
        let result = HmacTokenCodec::new(SecretString::from("too-short".to_string()));
        assert!(matches!(result, Err(TokenError::KeyTooShort)));
    }

    #[test]
    fn tampered_body_fails_signature() -> Result<()> {
        let codec = codec()?;
        let encoded = codec.encode(&payload())?;
        let (_, tag) = encoded.split_once('.').unwrap_or_default();

        let forged = ConfirmationPayload {
            normalized_email: "mallory@b.com".to_string(),
            activation_token: "abc".to_string(),
        };
        let forged_body = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&forged)?);

        let result = codec.decode(&format!("{forged_body}.{tag}"));
        assert!(matches!(result, Err(TokenError::Signature)));
        Ok(())
    }

    #[test]
    fn token_from_other_key_is_rejected() -> Result<()> {
        let other = HmacTokenCodec::new(SecretString::from("f".repeat(32)))?;
        let encoded = other.encode(&payload())?;
        assert!(matches!(
            codec()?.decode(&encoded),
            Err(TokenError::Signature)
        ));
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_rejected() -> Result<()> {
        let codec = codec()?;
        assert!(matches!(codec.decode(""), Err(TokenError::Format)));
        assert!(matches!(codec.decode("no-separator"), Err(TokenError::Format)));
        assert!(matches!(codec.decode("a.b.c"), Err(TokenError::Format)));
        assert!(matches!(codec.decode("abc.%%%"), Err(TokenError::Base64)));
        Ok(())
    }

    #[test]
    fn payload_uses_compact_field_names() -> Result<()> {
        let value = serde_json::to_value(payload())?;
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["token"], "abc");
        Ok(())
    }

    #[test]
    fn debug_redacts_key() -> Result<()> {
        let rendered = format!("{:?}", codec()?);
        assert!(!rendered.contains(KEY));
        Ok(())
    }
}
