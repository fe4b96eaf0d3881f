//! # USS Authenticator
//!
//! Signs and verifies messages on behalf of one node. The node identity is
//! taken from the key service it is built on.

use std::sync::Arc;

use qb_01_qkd_service::{MainRowInfo, QkdKeyApi};
use serde::{Deserialize, Serialize};
use shared_types::{DeviceId, NodeName, SignIndex};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::domain::errors::{UssError, UssResult};
use crate::domain::signature::{
    mask_digest, MatchCount, UssSignature, VerifyThreshold, DEFAULT_VERIFY_DELTA,
};
use crate::domain::toeplitz::{ToeplitzMatrix, DEFAULT_TOEPLITZ_SEED};

/// USS configuration shared by all nodes of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UssConfig {
    pub toeplitz_seed: String,
    pub verify_delta: f64,
}

impl Default for UssConfig {
    fn default() -> Self {
        Self {
            toeplitz_seed: DEFAULT_TOEPLITZ_SEED.to_string(),
            verify_delta: DEFAULT_VERIFY_DELTA,
        }
    }
}

/// Signer and verifier bound to one node.
pub struct UssAuthenticator {
    keys: Arc<dyn QkdKeyApi>,
    device_id: DeviceId,
    toeplitz_seed: Vec<u8>,
    threshold: VerifyThreshold,
}

impl UssAuthenticator {
    pub fn new(
        keys: Arc<dyn QkdKeyApi>,
        device_id: DeviceId,
        config: &UssConfig,
    ) -> UssResult<Self> {
        Ok(Self {
            keys,
            device_id,
            toeplitz_seed: config.toeplitz_seed.as_bytes().to_vec(),
            threshold: VerifyThreshold::new(config.verify_delta)?,
        })
    }

    pub fn node_name(&self) -> NodeName {
        self.keys.node_name()
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Sign `message` for `verifier_count` verifiers under a fresh signing event.
    pub fn sign(
        &self,
        verifier_count: u32,
        unit_len: u32,
        message: &[u8],
    ) -> UssResult<UssSignature> {
        self.sign_with_index(SignIndex::fresh(self.device_id), verifier_count, unit_len, message)
    }

    /// Sign under a caller-chosen signing event.
    pub fn sign_with_index(
        &self,
        sign_index: SignIndex,
        verifier_count: u32,
        unit_len: u32,
        message: &[u8],
    ) -> UssResult<UssSignature> {
        let toeplitz = ToeplitzMatrix::generate(&self.toeplitz_seed, &sign_index);
        let digest = toeplitz.compress(message)?;
        let full = self.keys.full_matrix(&sign_index, verifier_count, unit_len)?;

        let tag = full
            .as_bytes()
            .chunks_exact(unit_len as usize)
            .flat_map(|cell| mask_digest(&digest, cell))
            .collect();

        Ok(UssSignature {
            sign_index,
            main_row_info: MainRowInfo::for_signer(self.node_name(), verifier_count, unit_len),
            verifier_count,
            unit_len,
            message: message.to_vec(),
            tag,
        })
    }

    /// Count the tag cells this node can recompute and how many of them match.
    ///
    /// A verifier checks its `k` residual cells. A node checking its own
    /// signature holds the full matrix and checks all `k * k` cells.
    pub fn match_count(&self, signature: &UssSignature) -> UssResult<MatchCount> {
        signature.check_shape()?;
        let toeplitz = ToeplitzMatrix::generate(&self.toeplitz_seed, &signature.sign_index);
        let digest = toeplitz.compress(&signature.message)?;
        let k = signature.verifier_count;
        let u = signature.unit_len;

        let mut count = MatchCount {
            matches: 0,
            checked: 0,
        };
        let mut record = |expected: Vec<u8>, row: u32, column: u32| {
            count.checked += 1;
            if let Some(cell) = signature.tag_cell(row, column) {
                if bool::from(cell.ct_eq(expected.as_slice())) {
                    count.matches += 1;
                }
            }
        };

        if signature.main_row_info.signer_node_name == self.node_name() {
            let full = self.keys.full_matrix(&signature.sign_index, k, u)?;
            for row in 0..k {
                for column in 0..k {
                    let key = full.cell(row as usize, column as usize);
                    record(mask_digest(&digest, key), row + 1, column + 1);
                }
            }
        } else {
            let residual = self
                .keys
                .read_residual(&signature.sign_index, &signature.main_row_info)?;
            for cell in &residual.cells {
                record(mask_digest(&digest, &cell.key), cell.row, cell.column);
            }
        }
        Ok(count)
    }

    /// Accept or reject `signature`. Malformed input is rejected, never a panic.
    pub fn verify(&self, signature: &UssSignature) -> bool {
        match self.match_count(signature) {
            Ok(count) if self.threshold.accepts(count) => {
                debug!(
                    signer = %signature.main_row_info.signer_node_name,
                    matches = count.matches,
                    checked = count.checked,
                    "USS signature accepted"
                );
                true
            }
            Ok(count) => {
                warn!(
                    reason = "tag_mismatch",
                    signer = %signature.main_row_info.signer_node_name,
                    matches = count.matches,
                    checked = count.checked,
                    "USS signature rejected"
                );
                false
            }
            Err(e) => {
                warn!(
                    reason = rejection_reason(&e),
                    signer = %signature.main_row_info.signer_node_name,
                    error = %e,
                    "USS signature rejected"
                );
                false
            }
        }
    }
}

fn rejection_reason(error: &UssError) -> &'static str {
    match error {
        UssError::MessageTooLong { .. } => "message_too_long",
        UssError::Malformed(_) => "malformed",
        UssError::InvalidDelta(_) => "config",
        UssError::Qkd(_) => "key_material",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_01_qkd_service::{QkdConfig, QkdService};

    fn node(name: NodeName, device: &[u8; 16]) -> UssAuthenticator {
        let keys = Arc::new(QkdService::new(name, QkdConfig::default()));
        UssAuthenticator::new(keys, DeviceId(*device), &UssConfig::default()).unwrap()
    }

    #[test]
    fn test_tag_has_one_cell_per_key() {
        let p1 = node(NodeName::replica(1), b"DEVICE-P1-000001");
        let sig = p1.sign(3, 16, b"prepare").unwrap();
        assert_eq!(sig.tag.len(), 3 * 3 * 16);
        assert_eq!(sig.main_row_info.main_row, 0);
        assert_eq!(sig.main_row_info.signer_node_name, NodeName::replica(1));
        assert_eq!(sig.sign_index.signer_device_id, p1.device_id());
    }

    #[test]
    fn test_peer_accepts_with_full_row_match() {
        let p1 = node(NodeName::replica(1), b"DEVICE-P1-000001");
        let p2 = node(NodeName::replica(2), b"DEVICE-P2-000002");
        let sig = p1.sign(3, 16, b"commit").unwrap();
        assert_eq!(
            p2.match_count(&sig).unwrap(),
            MatchCount {
                matches: 3,
                checked: 3
            }
        );
        assert!(p2.verify(&sig));
    }

    #[test]
    fn test_signer_checks_whole_matrix() {
        let p1 = node(NodeName::replica(1), b"DEVICE-P1-000001");
        let sig = p1.sign(3, 16, b"commit").unwrap();
        assert_eq!(p1.match_count(&sig).unwrap().checked, 9);
        assert!(p1.verify(&sig));
    }

    #[test]
    fn test_oversized_message_fails_to_sign() {
        let p1 = node(NodeName::replica(1), b"DEVICE-P1-000001");
        assert!(matches!(
            p1.sign(3, 16, &[0u8; 1025]),
            Err(UssError::MessageTooLong { len: 1025, .. })
        ));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let p1 = node(NodeName::replica(1), b"DEVICE-P1-000001");
        let p2 = node(NodeName::replica(2), b"DEVICE-P2-000002");
        let mut sig = p1.sign(3, 16, b"x").unwrap();
        sig.tag.truncate(10);
        assert!(!p2.verify(&sig));

        let mut sig = p1.sign(3, 16, b"x").unwrap();
        sig.message = vec![0u8; 2048];
        assert!(!p2.verify(&sig));
    }

    #[test]
    fn test_invalid_delta_is_rejected() {
        let keys = Arc::new(QkdService::new(NodeName::replica(1), QkdConfig::default()));
        let config = UssConfig {
            verify_delta: 0.0,
            ..UssConfig::default()
        };
        assert!(matches!(
            UssAuthenticator::new(keys, DeviceId([0; 16]), &config),
            Err(UssError::InvalidDelta(_))
        ));
    }
}
