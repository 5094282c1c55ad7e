//! Authenticated, encrypted cookie values.
//!
//! A token is `base64url(nonce || AES-256-GCM(plaintext, aad = cookie name))`
//! where the plaintext is the issue time (unix seconds, big-endian `i64`)
//! followed by the value. The newest key seals; every configured key is
//! tried when opening, so keys can be rotated without logging everyone out.

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use thiserror::Error;

use crate::crypto::aes::{self, NONCE_SIZE, SecureKey, TAG_SIZE};

const TIMESTAMP_SIZE: usize = 8;
/// Tokens issued further than this in the future are treated as expired.
const FUTURE_SKEW_SECS: i64 = 60;

/// Why a cookie value could not be produced or opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("no cookie keys configured")]
    NoKeys,

    #[error("malformed cookie value: {0}")]
    Malformed(&'static str),

    #[error("cookie value failed authentication")]
    Invalid,

    #[error("cookie value expired")]
    Expired,

    #[error("cookie encryption failed: {0}")]
    Encryption(String),
}

/// Seals and opens cookie values with a rotating key set.
pub struct CookieCodec {
    keys: Vec<SecureKey>,
    max_age_secs: i64,
}

impl CookieCodec {
    /// Creates a codec. `keys` are ordered newest first.
    pub fn new(keys: Vec<SecureKey>, max_age_secs: i64) -> Result<Self, CodecError> {
        if keys.is_empty() {
            return Err(CodecError::NoKeys);
        }
        Ok(Self { keys, max_age_secs })
    }

    /// Seals `value` for the cookie called `name`.
    pub fn encode(&self, name: &str, value: &str) -> Result<String, CodecError> {
        self.encode_at(name, value, Utc::now().timestamp())
    }

    /// Opens a token produced by [`CookieCodec::encode`] for the same cookie name.
    pub fn decode(&self, name: &str, token: &str) -> Result<String, CodecError> {
        self.decode_at(name, token, Utc::now().timestamp())
    }

    fn encode_at(&self, name: &str, value: &str, issued_at: i64) -> Result<String, CodecError> {
        let key = self.keys.first().ok_or(CodecError::NoKeys)?;

        let mut plaintext = Vec::with_capacity(TIMESTAMP_SIZE + value.len());
        plaintext.extend_from_slice(&issued_at.to_be_bytes());
        plaintext.extend_from_slice(value.as_bytes());

        let (ciphertext, nonce) = aes::encrypt(key, &plaintext, name.as_bytes())
            .map_err(|e| CodecError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decode_at(&self, name: &str, token: &str, now: i64) -> Result<String, CodecError> {
        let sealed = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CodecError::Malformed("not base64url"))?;

        if sealed.len() < NONCE_SIZE + TAG_SIZE + TIMESTAMP_SIZE {
            return Err(CodecError::Malformed("too short"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| CodecError::Malformed("bad nonce"))?;

        let plaintext = self
            .keys
            .iter()
            .find_map(|key| aes::decrypt(key, ciphertext, &nonce, name.as_bytes()).ok())
            .ok_or(CodecError::Invalid)?;

        let (timestamp, value) = plaintext.split_at(TIMESTAMP_SIZE);
        let timestamp: [u8; TIMESTAMP_SIZE] = timestamp
            .try_into()
            .map_err(|_| CodecError::Malformed("bad timestamp"))?;
        let issued_at = i64::from_be_bytes(timestamp);

        if now.saturating_sub(issued_at) > self.max_age_secs
            || issued_at.saturating_sub(now) > FUTURE_SKEW_SECS
        {
            return Err(CodecError::Expired);
        }

        String::from_utf8(value.to_vec()).map_err(|_| CodecError::Malformed("value is not utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes::generate_key;

    const NAME: &str = "ccfp-session";
    const VALUE: &str = "0190b5a8-6c4e-7b7a-9f5e-3d1c2b4a5e6f";

    fn codec() -> CookieCodec {
        CookieCodec::new(vec![SecureKey::new([1u8; 32])], 3600).unwrap()
    }

    #[test]
    fn decode_recovers_encoded_value() {
        let codec = codec();
        let token = codec.encode(NAME, VALUE).unwrap();
        assert_eq!(codec.decode(NAME, &token).unwrap(), VALUE);
    }

    #[test]
    fn every_single_byte_mutation_is_rejected() {
        let codec = codec();
        let token = codec.encode(NAME, VALUE).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            for replacement in [b'A', b'z', b'-', b'%'] {
                if bytes[i] == replacement {
                    continue;
                }
                let mut tampered = bytes.to_vec();
                tampered[i] = replacement;
                let tampered = String::from_utf8(tampered).unwrap();
                assert!(
                    codec.decode(NAME, &tampered).is_err(),
                    "mutation at {} to {:?} was accepted",
                    i,
                    replacement as char
                );
            }
        }
    }

    #[test]
    fn token_is_bound_to_cookie_name() {
        let codec = codec();
        let token = codec.encode(NAME, VALUE).unwrap();
        assert_eq!(codec.decode("other", &token), Err(CodecError::Invalid));
    }

    #[test]
    fn rotated_keys_still_open_old_tokens() {
        let old = CookieCodec::new(vec![SecureKey::new([1u8; 32])], 3600).unwrap();
        let token = old.encode(NAME, VALUE).unwrap();

        let rotated = CookieCodec::new(
            vec![SecureKey::new([2u8; 32]), SecureKey::new([1u8; 32])],
            3600,
        )
        .unwrap();
        assert_eq!(rotated.decode(NAME, &token).unwrap(), VALUE);

        let fresh = rotated.encode(NAME, VALUE).unwrap();
        assert_eq!(old.decode(NAME, &fresh), Err(CodecError::Invalid));
    }

    #[test]
    fn unknown_key_is_invalid() {
        let token = codec().encode(NAME, VALUE).unwrap();
        let stranger = CookieCodec::new(vec![generate_key()], 3600).unwrap();
        assert_eq!(stranger.decode(NAME, &token), Err(CodecError::Invalid));
    }

    #[test]
    fn expired_and_future_tokens_are_rejected() {
        let codec = codec();
        let now = 1_700_000_000;

        let stale = codec.encode_at(NAME, VALUE, now - 3601).unwrap();
        assert_eq!(codec.decode_at(NAME, &stale, now), Err(CodecError::Expired));

        let edge = codec.encode_at(NAME, VALUE, now - 3600).unwrap();
        assert_eq!(codec.decode_at(NAME, &edge, now).unwrap(), VALUE);

        let future = codec.encode_at(NAME, VALUE, now + 600).unwrap();
        assert_eq!(codec.decode_at(NAME, &future, now), Err(CodecError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert!(matches!(codec.decode(NAME, "not a token!"), Err(CodecError::Malformed(_))));
        assert!(matches!(codec.decode(NAME, "AAAA"), Err(CodecError::Malformed(_))));
        assert!(matches!(codec.decode(NAME, ""), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn empty_key_set_is_refused() {
        assert!(matches!(CookieCodec::new(vec![], 60), Err(CodecError::NoKeys)));
    }
}
