//! # USS Signature Entity
//!
//! A signature carries the signed message in clear together with a tag of
//! `k * k` cells, one per key cell of the signer's matrix. Each verifier can
//! recompute exactly `k` of those cells.

use qb_01_qkd_service::MainRowInfo;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_types::SignIndex;

use super::errors::{UssError, UssResult};
use super::toeplitz::DIGEST_LEN;

/// Default acceptance parameter; with 0.75 every row has to match.
pub const DEFAULT_VERIFY_DELTA: f64 = 0.75;

/// A signed message as sent on the wire.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssSignature {
    pub sign_index: SignIndex,
    pub main_row_info: MainRowInfo,
    pub verifier_count: u32,
    pub unit_len: u32,
    #[serde_as(as = "Hex")]
    pub message: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub tag: Vec<u8>,
}

impl UssSignature {
    /// Tag cell at 1-based `(row, column)`, if the tag is long enough.
    pub fn tag_cell(&self, row: u32, column: u32) -> Option<&[u8]> {
        if row == 0 || column == 0 {
            return None;
        }
        let k = self.verifier_count as usize;
        let u = self.unit_len as usize;
        let start = ((row as usize - 1) * k + column as usize - 1) * u;
        self.tag.get(start..start + u)
    }

    /// Reject signatures whose declared shape disagrees with itself.
    pub fn check_shape(&self) -> UssResult<()> {
        if self.main_row_info.verifier_count != self.verifier_count
            || self.main_row_info.unit_len != self.unit_len
        {
            return Err(UssError::Malformed("shape differs from main-row info"));
        }
        let expected = (self.verifier_count as usize)
            .checked_mul(self.verifier_count as usize)
            .and_then(|cells| cells.checked_mul(self.unit_len as usize));
        if expected != Some(self.tag.len()) {
            return Err(UssError::Malformed("tag length differs from shape"));
        }
        Ok(())
    }
}

/// One tag cell: the digest fitted to `unit_len` bytes, XORed with a key cell.
pub fn mask_digest(digest: &[u8; DIGEST_LEN], key: &[u8]) -> Vec<u8> {
    key.iter()
        .enumerate()
        .map(|(i, k)| digest.get(i).copied().unwrap_or(0) ^ k)
        .collect()
}

/// Matching cells out of the cells this node was able to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCount {
    pub matches: u32,
    pub checked: u32,
}

/// Acceptance rule `matches >= (0.5 + 2(1 - delta)) * checked`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyThreshold {
    delta: f64,
}

impl VerifyThreshold {
    pub fn new(delta: f64) -> UssResult<Self> {
        if !(delta > 0.0 && delta <= 1.0) {
            return Err(UssError::InvalidDelta(delta));
        }
        Ok(Self { delta })
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Minimum number of matching cells out of `checked`.
    pub fn required(&self, checked: u32) -> f64 {
        (0.5 + 2.0 * (1.0 - self.delta)) * f64::from(checked)
    }

    pub fn accepts(&self, count: MatchCount) -> bool {
        count.checked > 0 && f64::from(count.matches) >= self.required(count.checked)
    }
}

impl Default for VerifyThreshold {
    fn default() -> Self {
        Self {
            delta: DEFAULT_VERIFY_DELTA,
        }
    }
}
