//! # Toeplitz Hash Engine
//!
//! Compresses a message of up to 1024 bytes into a 16-byte digest by a
//! matrix-vector product modulo 255. The matrix is constant along its
//! diagonals, so only its `rows + cols - 1` generating bytes are stored.

use qb_01_qkd_service::generate_random_bytes;
use shared_types::SignIndex;

use super::errors::{UssError, UssResult};

/// Seed shared by every node for Toeplitz generation.
pub const DEFAULT_TOEPLITZ_SEED: &str = "Toeplitz Matrix";

/// Digest length in bytes (matrix rows).
pub const DIGEST_LEN: usize = 16;

/// Maximum message length in bytes (matrix columns).
pub const MESSAGE_LEN: usize = 1024;

/// Toeplitz matrix of one signing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToeplitzMatrix {
    diagonals: Vec<u8>,
}

impl ToeplitzMatrix {
    /// Derive the matrix for `index`; `m[i][j] = bytes[rows - 1 - i + j]`.
    pub fn generate(seed: &[u8], index: &SignIndex) -> Self {
        let diagonals = generate_random_bytes(
            seed,
            index.signer_device_id.as_bytes(),
            &index.task_serial,
            1,
            DIGEST_LEN + MESSAGE_LEN - 1,
        );
        Self { diagonals }
    }

    /// Entry at zero-based `(row, column)`.
    pub fn get(&self, row: usize, column: usize) -> u8 {
        self.diagonals[DIGEST_LEN - 1 - row + column]
    }

    /// `digest[i] = (sum_j msg[j] * m[i][j]) mod 255` over the zero-padded message.
    ///
    /// Message bytes only matter mod 255: `0x00` and `0xFF` at the same
    /// position give the same digest, so that substitution goes undetected.
    pub fn compress(&self, message: &[u8]) -> UssResult<[u8; DIGEST_LEN]> {
        let padded = pad_message(message)?;
        let mut digest = [0u8; DIGEST_LEN];
        for (i, out) in digest.iter_mut().enumerate() {
            let sum: u64 = padded
                .iter()
                .enumerate()
                .map(|(j, &b)| u64::from(b) * u64::from(self.get(i, j)))
                .sum();
            *out = (sum % 255) as u8;
        }
        Ok(digest)
    }
}

/// Right-pad `message` with zeros to exactly [`MESSAGE_LEN`] bytes.
pub fn pad_message(message: &[u8]) -> UssResult<[u8; MESSAGE_LEN]> {
    if message.len() > MESSAGE_LEN {
        return Err(UssError::MessageTooLong {
            len: message.len(),
            max: MESSAGE_LEN,
        });
    }
    let mut padded = [0u8; MESSAGE_LEN];
    padded[..message.len()].copy_from_slice(message);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DeviceId;

    fn matrix() -> ToeplitzMatrix {
        let index = SignIndex::new(DeviceId(*b"XHSGDFAYQHDJ2163"), [9; 16]);
        ToeplitzMatrix::generate(DEFAULT_TOEPLITZ_SEED.as_bytes(), &index)
    }

    #[test]
    fn test_constant_along_diagonals() {
        let m = matrix();
        for i in 1..DIGEST_LEN {
            for j in 1..MESSAGE_LEN {
                assert_eq!(m.get(i, j), m.get(i - 1, j - 1));
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(matrix(), matrix());
    }

    #[test]
    fn test_compress_matches_naive_product() {
        let m = matrix();
        let message = b"pre-prepare view=0 seq=1";
        let digest = m.compress(message).unwrap();
        for (i, &d) in digest.iter().enumerate() {
            let mut acc: u64 = 0;
            for (j, &b) in message.iter().enumerate() {
                acc = (acc + u64::from(b) * u64::from(m.get(i, j))) % 255;
            }
            assert_eq!(u64::from(d), acc);
        }
    }

    #[test]
    fn test_trailing_zeros_do_not_change_digest() {
        let m = matrix();
        let mut padded = b"abc".to_vec();
        padded.resize(100, 0);
        assert_eq!(m.compress(b"abc").unwrap(), m.compress(&padded).unwrap());
    }

    #[test]
    fn test_full_length_accepted_longer_rejected() {
        let m = matrix();
        assert!(m.compress(&[1u8; MESSAGE_LEN]).is_ok());
        assert_eq!(
            m.compress(&[1u8; MESSAGE_LEN + 1]).unwrap_err(),
            UssError::MessageTooLong {
                len: MESSAGE_LEN + 1,
                max: MESSAGE_LEN
            }
        );
    }

    #[test]
    fn test_zero_and_ff_bytes_collide() {
        let m = matrix();
        let mut message = b"commit view=0 seq=1".to_vec();
        message[6] = 0x00;
        let zero = m.compress(&message).unwrap();
        message[6] = 0xFF;
        assert_eq!(m.compress(&message).unwrap(), zero);
        message[6] = 0xFE;
        assert_ne!(m.compress(&message).unwrap(), zero);
    }
}
