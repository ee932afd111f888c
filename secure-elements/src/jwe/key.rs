//! Recipient public key parsing.

use base64::{Engine, engine::general_purpose::STANDARD};
use x25519_dalek::PublicKey;

use crate::error::{ElementsError, Result};

/// DER prefix of a `SubjectPublicKeyInfo` wrapping a raw X25519 key (RFC 8410).
const X25519_SPKI_PREFIX: [u8; 12] =
    [0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00];

/// Removes `-----...-----` armor lines and all whitespace.
fn strip_pem_armor(input: &str) -> String {
    let mut rest = input;
    let mut body = String::with_capacity(input.len());

    while let Some(start) = rest.find("-----") {
        body.push_str(&rest[..start]);
        let after_open = &rest[start + 5..];
        match after_open.find("-----") {
            Some(end) => rest = &after_open[end + 5..],
            None => {
                rest = after_open;
                break;
            }
        }
    }
    body.push_str(rest);
    body.retain(|c| !c.is_whitespace());
    body
}

/// Parses a recipient X25519 public key from PEM or bare base64.
///
/// Accepts either the raw 32-byte point or an RFC 8410 `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns [`ElementsError::InvalidPublicKey`] if the input is empty, is not
/// standard base64 after armor removal, or has the wrong length.
pub fn parse_public_key(input: &str) -> Result<PublicKey> {
    let cleaned = strip_pem_armor(input);
    if cleaned.is_empty() {
        return Err(ElementsError::InvalidPublicKey("key is empty".to_owned()));
    }

    let decoded = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ElementsError::InvalidPublicKey(format!("not valid base64: {e}")))?;

    let raw: &[u8] = match decoded.len() {
        32 => &decoded,
        44 if decoded.starts_with(&X25519_SPKI_PREFIX) => &decoded[X25519_SPKI_PREFIX.len()..],
        len => {
            return Err(ElementsError::InvalidPublicKey(format!(
                "expected a 32-byte X25519 key, got {len} bytes"
            )));
        }
    };

    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| ElementsError::InvalidPublicKey("X25519 key must be 32 bytes".to_owned()))?;
    Ok(PublicKey::from(bytes))
}
