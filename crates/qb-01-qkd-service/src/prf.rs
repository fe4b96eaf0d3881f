//! # Iterated HMAC-SHA256 PRF
//!
//! Deterministic byte generator shared by the key-matrix allocator and the
//! Toeplitz generator. Signer and verifiers recompute identical output from
//! the same `(seed, signer_id, task_serial)` triple.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 output size; one PRF round yields this many bytes.
const ROUND_LEN: usize = 32;

/// Generate `count * unit_len` pseudorandom bytes.
///
/// The chain starts at `h = HMAC(seed, signer_id || task_serial)` and each
/// round re-keys as `h = HMAC(seed, h)`, appending every new `h`. The
/// concatenation is truncated to the requested length.
pub fn generate_random_bytes(
    seed: &[u8],
    signer_id: &[u8; 16],
    task_serial: &[u8; 16],
    count: usize,
    unit_len: usize,
) -> Vec<u8> {
    let len = count * unit_len;
    let rounds = len / ROUND_LEN + 1;

    let mut digest = hmac_sha256(seed, &[signer_id.as_slice(), task_serial.as_slice()]);
    let mut randoms = Vec::with_capacity(rounds * ROUND_LEN);
    for _ in 0..rounds {
        digest = hmac_sha256(seed, &[digest.as_slice()]);
        randoms.extend_from_slice(&digest);
    }
    randoms.truncate(len);
    randoms
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; ROUND_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}
