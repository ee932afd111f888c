//! JWE compact encryption (ECDH-ES direct key agreement + A256GCM).
//!
//! Implements the subset of RFC 7516 / RFC 7518 needed to encrypt element
//! values for a backend that holds the matching X25519 private key:
//!
//! 1. A fresh ephemeral X25519 key pair is generated for every call.
//! 2. The ECDH shared secret is run through Concat KDF ([`kdf`]) to derive a
//!    256-bit content encryption key.
//! 3. The payload is sealed with AES-256-GCM under a fresh 96-bit nonce, with
//!    the base64url protected header as additional authenticated data.
//!
//! The output is the five-segment compact serialization
//! `header..iv.ciphertext.tag`. The encrypted-key segment is always empty
//! because no content key is wrapped in direct mode.
//!
//! # Examples
//!
//! ```
//! use secure_elements::jwe;
//!
//! # fn example() -> secure_elements::error::Result<()> {
//! let recipient = "3p7bfXt9wbTTW2HC7OQ1Nz+DQ8hbeGdNrfx+FG+IK08=";
//! let token = jwe::encrypt(br#"{"number":"4242424242424242"}"#, recipient, "key-1")?;
//! assert_eq!(token.split('.').count(), 5);
//! assert_eq!(token.split('.').nth(1), Some(""));
//! # Ok(())
//! # }
//! ```

pub mod kdf;
pub mod key;

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use tracing::{debug, instrument};
use x25519_dalek::{EphemeralSecret, PublicKey};

pub use self::key::parse_public_key;
use crate::error::{ElementsError, Result};

/// JWE `alg` header value.
pub const ALG: &str = "ECDH-ES";
/// JWE `enc` header value.
pub const ENC: &str = "A256GCM";
/// JWK key type of the ephemeral public key.
pub const KEY_TYPE: &str = "OKP";
/// JWK curve of the ephemeral public key.
pub const CURVE: &str = "X25519";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A JWE in compact form, split into its five base64url segments.
///
/// Envelopes are produced once per payload and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JweEnvelope {
    /// Base64url protected header; its ASCII bytes are the GCM AAD.
    pub protected_header: String,
    /// Always empty for direct ECDH-ES.
    pub encrypted_key: String,
    /// Base64url 96-bit nonce.
    pub iv: String,
    /// Base64url ciphertext.
    pub ciphertext: String,
    /// Base64url 128-bit authentication tag.
    pub tag: String,
}

impl JweEnvelope {
    /// Splits a compact serialization into segments.
    ///
    /// Only checks the segment count; it does not decode anything.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::InvalidInput`] unless there are exactly five segments.
    pub fn from_compact(compact: &str) -> Result<Self> {
        let parts: Vec<&str> = compact.split('.').collect();
        let [header, key, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(ElementsError::InvalidInput(format!(
                "compact JWE must have 5 segments, found {}",
                parts.len()
            )));
        };
        Ok(Self {
            protected_header: (*header).to_owned(),
            encrypted_key: (*key).to_owned(),
            iv: (*iv).to_owned(),
            ciphertext: (*ciphertext).to_owned(),
            tag: (*tag).to_owned(),
        })
    }

    /// Returns the compact serialization.
    #[must_use]
    pub fn to_compact(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JweEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.protected_header, self.encrypted_key, self.iv, self.ciphertext, self.tag
        )
    }
}

/// Ephemeral public key as an OKP JWK. Fields are declared in lexical order.
#[derive(Serialize)]
struct EphemeralKey<'a> {
    crv: &'a str,
    kty: &'a str,
    x: String,
}

/// Protected header members, declared in lexical order.
#[derive(Serialize)]
struct ProtectedHeader<'a> {
    alg: &'a str,
    enc: &'a str,
    epk: EphemeralKey<'a>,
    kid: &'a str,
}

/// Builds the base64url protected header for an ephemeral public key.
fn protected_header(ephemeral: &PublicKey, key_id: &str) -> Result<String> {
    let header = ProtectedHeader {
        alg: ALG,
        enc: ENC,
        epk: EphemeralKey {
            crv: CURVE,
            kty: KEY_TYPE,
            x: URL_SAFE_NO_PAD.encode(ephemeral.as_bytes()),
        },
        kid: key_id,
    };
    let bytes = serde_json::to_vec(&header)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Encrypts `payload` for the holder of `recipient_public_key`.
///
/// Returns the compact serialization. See [`encrypt_envelope`] for the
/// segment-level result.
///
/// # Errors
///
/// - [`ElementsError::InvalidPublicKey`] if the key is empty or unparsable
///   (checked before the key id)
/// - [`ElementsError::InvalidKeyId`] if `key_id` is empty
/// - [`ElementsError::KeyAgreementFailed`] if the recipient point is low order
/// - [`ElementsError::EncryptionFailed`] if AES-GCM rejects the input
pub fn encrypt(payload: &[u8], recipient_public_key: &str, key_id: &str) -> Result<String> {
    encrypt_envelope(payload, recipient_public_key, key_id).map(|env| env.to_compact())
}

/// Encrypts `payload` and returns the individual JWE segments.
///
/// # Errors
///
/// Same as [`encrypt`].
#[instrument(skip(payload, recipient_public_key), fields(payload_len = payload.len()))]
pub fn encrypt_envelope(
    payload: &[u8],
    recipient_public_key: &str,
    key_id: &str,
) -> Result<JweEnvelope> {
    if recipient_public_key.is_empty() {
        return Err(ElementsError::InvalidPublicKey("key is empty".to_owned()));
    }
    if key_id.is_empty() {
        return Err(ElementsError::InvalidKeyId);
    }

    let recipient = parse_public_key(recipient_public_key)?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        return Err(ElementsError::KeyAgreementFailed(
            "recipient key is a low-order point".to_owned(),
        ));
    }

    let cek = kdf::derive_a256gcm_key(shared.as_bytes());
    let header = protected_header(&ephemeral_public, key_id)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(&cek)
        .map_err(|e| ElementsError::EncryptionFailed(format!("invalid content key: {e}")))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: payload, aad: header.as_bytes() })
        .map_err(|_| ElementsError::EncryptionFailed("AES-GCM seal failed".to_owned()))?;

    // aes-gcm appends the tag to the ciphertext
    let split = sealed.len().checked_sub(TAG_LEN).ok_or_else(|| {
        ElementsError::EncryptionFailed("sealed output shorter than tag".to_owned())
    })?;
    let (ciphertext, tag) = sealed.split_at(split);

    debug!(kid = key_id, ciphertext_len = ciphertext.len(), "payload encrypted");

    Ok(JweEnvelope {
        protected_header: header,
        encrypted_key: String::new(),
        iv: URL_SAFE_NO_PAD.encode(nonce),
        ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        tag: URL_SAFE_NO_PAD.encode(tag),
    })
}

#[cfg(test)]
mod tests {
    use x25519_dalek::StaticSecret;

    use super::*;

    fn recipient() -> (StaticSecret, String) {
        let secret = StaticSecret::from([0x42u8; 32]);
        let public = PublicKey::from(&secret);
        let b64 = base64::engine::general_purpose::STANDARD.encode(public.as_bytes());
        (secret, b64)
    }

    fn decrypt(envelope: &JweEnvelope, secret: &StaticSecret) -> Vec<u8> {
        let header_json = URL_SAFE_NO_PAD.decode(&envelope.protected_header).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_json).unwrap();
        let x = URL_SAFE_NO_PAD.decode(header["epk"]["x"].as_str().unwrap()).unwrap();
        let epk: [u8; 32] = x.try_into().unwrap();
        let shared = secret.diffie_hellman(&PublicKey::from(epk));
        let cek = kdf::derive_a256gcm_key(shared.as_bytes());

        let mut sealed = URL_SAFE_NO_PAD.decode(&envelope.ciphertext).unwrap();
        sealed.extend(URL_SAFE_NO_PAD.decode(&envelope.tag).unwrap());
        let nonce = URL_SAFE_NO_PAD.decode(&envelope.iv).unwrap();

        Aes256Gcm::new_from_slice(&cek)
            .unwrap()
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload { msg: &sealed, aad: envelope.protected_header.as_bytes() },
            )
            .unwrap()
    }

    #[test]
    fn test_round_trip_with_static_recipient() {
        let (secret, public) = recipient();
        let envelope = encrypt_envelope(b"hello element", &public, "kid-1").unwrap();
        assert_eq!(decrypt(&envelope, &secret), b"hello element");
    }

    #[test]
    fn test_header_is_sorted_canonical_json() {
        let (_, public) = recipient();
        let envelope = encrypt_envelope(b"x", &public, "kid-1").unwrap();
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(&envelope.protected_header).unwrap())
            .unwrap();
        assert!(json.starts_with(r#"{"alg":"ECDH-ES","enc":"A256GCM","epk":{"crv":"X25519","kty":"OKP","x":""#));
        assert!(json.ends_with(r#""},"kid":"kid-1"}"#));
    }

    #[test]
    fn test_header_matches_fixed_ephemeral_key() {
        let ephemeral = PublicKey::from(&StaticSecret::from([0x07u8; 32]));
        let x = URL_SAFE_NO_PAD.encode(ephemeral.as_bytes());
        let header = protected_header(&ephemeral, "k").unwrap();
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(
            json,
            format!(r#"{{"alg":"ECDH-ES","enc":"A256GCM","epk":{{"crv":"X25519","kty":"OKP","x":"{x}"}},"kid":"k"}}"#)
        );
    }

    #[test]
    fn test_segment_sizes() {
        let (_, public) = recipient();
        let envelope = encrypt_envelope(b"0123456789", &public, "kid").unwrap();
        assert!(envelope.encrypted_key.is_empty());
        assert_eq!(URL_SAFE_NO_PAD.decode(&envelope.iv).unwrap().len(), NONCE_LEN);
        assert_eq!(URL_SAFE_NO_PAD.decode(&envelope.tag).unwrap().len(), TAG_LEN);
        assert_eq!(URL_SAFE_NO_PAD.decode(&envelope.ciphertext).unwrap().len(), 10);
    }

    #[test]
    fn test_fresh_ephemeral_key_and_nonce_per_call() {
        let (_, public) = recipient();
        let a = encrypt_envelope(b"same", &public, "kid").unwrap();
        let b = encrypt_envelope(b"same", &public, "kid").unwrap();
        assert_ne!(a.protected_header, b.protected_header);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.to_compact(), b.to_compact());
    }

    #[test]
    fn test_empty_key_checked_before_key_id() {
        assert!(matches!(encrypt(b"x", "", ""), Err(ElementsError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_empty_key_id() {
        let (_, public) = recipient();
        assert!(matches!(encrypt(b"x", &public, ""), Err(ElementsError::InvalidKeyId)));
    }

    #[test]
    fn test_low_order_point_rejected() {
        let zero = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(matches!(
            encrypt(b"x", &zero, "kid"),
            Err(ElementsError::KeyAgreementFailed(_))
        ));
    }

    #[test]
    fn test_compact_round_trip_segments() {
        let (_, public) = recipient();
        let compact = encrypt(b"payload", &public, "kid").unwrap();
        let envelope = JweEnvelope::from_compact(&compact).unwrap();
        assert_eq!(envelope.to_compact(), compact);
        assert!(JweEnvelope::from_compact("a.b.c").is_err());
    }
}
