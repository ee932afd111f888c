//! Concat KDF (NIST SP 800-56A, single-step, SHA-256) as profiled by RFC 7518 §4.6.2.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of one SHA-256 block of derived keying material.
const HASH_LEN: usize = 32;

/// Builds the `OtherInfo` input for the KDF.
///
/// `AlgorithmID || PartyUInfo || PartyVInfo || SuppPubInfo`, where the first
/// three are big-endian length-prefixed octet strings and `SuppPubInfo` is the
/// key length in bits as a big-endian `u32`.
#[must_use]
pub fn other_info(algorithm_id: &str, apu: &[u8], apv: &[u8], key_bits: u32) -> Vec<u8> {
    let mut info = Vec::with_capacity(16 + algorithm_id.len() + apu.len() + apv.len());
    for field in [algorithm_id.as_bytes(), apu, apv] {
        info.extend_from_slice(&length_prefix(field));
        info.extend_from_slice(field);
    }
    info.extend_from_slice(&key_bits.to_be_bytes());
    info
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "JOSE header fields are far below 4 GiB"
)]
fn length_prefix(field: &[u8]) -> [u8; 4] {
    (field.len() as u32).to_be_bytes()
}

/// Derives `key_len` bytes from the shared secret `z`.
///
/// Hashes `counter || Z || OtherInfo` with the counter starting at 1 and
/// concatenates blocks until enough material exists, then truncates.
#[must_use]
pub fn concat_kdf(z: &[u8], other_info: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
    let mut derived = Zeroizing::new(Vec::with_capacity(key_len.div_ceil(HASH_LEN) * HASH_LEN));
    let mut counter: u32 = 1;

    while derived.len() < key_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(z);
        hasher.update(other_info);
        derived.extend_from_slice(&hasher.finalize());
        counter = counter.wrapping_add(1);
    }

    derived.truncate(key_len);
    derived
}

/// Derives the A256GCM content encryption key for direct ECDH-ES.
#[must_use]
pub fn derive_a256gcm_key(z: &[u8]) -> Zeroizing<Vec<u8>> {
    let info = other_info(super::ENC, &[], &[], 256);
    concat_kdf(z, &info, 32)
}
