//! # QKD Key Service
//!
//! Simulates the QKD device of one node. Key material is never exchanged:
//! every node derives it from the shared seed and the signing event, and a
//! verifier only ever reads its own residual.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{NodeName, SignIndex};
use tracing::debug;

use crate::cache::{ResidualKey, ResidualPool, DEFAULT_POOL_CAPACITY};
use crate::domain::{
    assign_main_row, check_dimensions, KeyMatrix, MainRow, MainRowInfo, QkdError, QkdResult,
    ResidualMatrix,
};
use crate::ports::inbound::QkdKeyApi;

/// Seed shared by every simulated QKD device.
pub const DEFAULT_QKD_SEED: &str = "QKD simulation";

/// QKD service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QkdConfig {
    pub seed: String,
    pub residual_cache_capacity: usize,
}

impl Default for QkdConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_QKD_SEED.to_string(),
            residual_cache_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Key service bound to one node identity.
pub struct QkdService {
    config: QkdConfig,
    node: NodeName,
    pool: ResidualPool,
}

impl QkdService {
    pub fn new(node: NodeName, config: QkdConfig) -> Self {
        let pool = ResidualPool::new(config.residual_cache_capacity);
        Self { config, node, pool }
    }

    /// Number of residuals currently cached.
    pub fn cached_residuals(&self) -> usize {
        self.pool.len()
    }

    fn seed(&self) -> &[u8] {
        self.config.seed.as_bytes()
    }
}

impl QkdKeyApi for QkdService {
    fn node_name(&self) -> NodeName {
        self.node
    }

    fn full_matrix(
        &self,
        index: &SignIndex,
        verifier_count: u32,
        unit_len: u32,
    ) -> QkdResult<KeyMatrix> {
        KeyMatrix::generate(self.seed(), index, verifier_count, unit_len)
    }

    fn read_residual(
        &self,
        index: &SignIndex,
        info: &MainRowInfo,
    ) -> QkdResult<Arc<ResidualMatrix>> {
        let main_row = match assign_main_row(info.signer_node_name, self.node) {
            MainRow::Signer => {
                return Err(QkdError::SignerHoldsFullMatrix {
                    signer: info.signer_node_name,
                })
            }
            MainRow::Row(row) => row,
        };
        check_dimensions(info.verifier_count, info.unit_len)?;

        let key = ResidualKey {
            index: *index,
            main_row,
            verifier_count: info.verifier_count,
            unit_len: info.unit_len,
        };
        if let Some(hit) = self.pool.get(&key) {
            return Ok(hit);
        }

        debug!(
            node = %self.node,
            signer = %info.signer_node_name,
            main_row,
            verifier_count = info.verifier_count,
            "Deriving verifier residual"
        );
        let full = self.full_matrix(index, info.verifier_count, info.unit_len)?;
        Ok(self
            .pool
            .get_or_insert_with(key, || ResidualMatrix::extract(&full, index, main_row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DeviceId;

    fn index() -> SignIndex {
        SignIndex::new(DeviceId(*b"XHSGDFAYQHDJ2163"), [0x42; 16])
    }

    #[test]
    fn test_signer_cannot_read_own_residual() {
        let p1 = QkdService::new(NodeName::replica(1), QkdConfig::default());
        let info = MainRowInfo::for_signer(NodeName::replica(1), 3, 16);
        assert_eq!(
            p1.read_residual(&index(), &info).unwrap_err(),
            QkdError::SignerHoldsFullMatrix {
                signer: NodeName::replica(1)
            }
        );
    }

    #[test]
    fn test_residual_matches_signer_matrix() {
        let signer = QkdService::new(NodeName::replica(1), QkdConfig::default());
        let verifier = QkdService::new(NodeName::replica(3), QkdConfig::default());
        let info = MainRowInfo::for_signer(NodeName::replica(1), 3, 16);

        let full = signer.full_matrix(&index(), 3, 16).unwrap();
        let residual = verifier.read_residual(&index(), &info).unwrap();

        // P3 under signer P1 reads main row 2
        assert_eq!(residual.main_row, 2);
        for cell in &residual.cells {
            let expected = full.cell(cell.row as usize - 1, cell.column as usize - 1);
            assert_eq!(cell.key, expected);
        }
    }

    #[test]
    fn test_carried_main_row_is_ignored() {
        let verifier = QkdService::new(NodeName::replica(2), QkdConfig::default());
        let honest = MainRowInfo::for_signer(NodeName::replica(4), 3, 16);
        let forged = honest.with_main_row(3);
        let a = verifier.read_residual(&index(), &honest).unwrap();
        let b = verifier.read_residual(&index(), &forged).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.main_row, 2);
    }

    #[test]
    fn test_residuals_are_cached() {
        let verifier = QkdService::new(NodeName::replica(2), QkdConfig::default());
        let info = MainRowInfo::for_signer(NodeName::client(1), 4, 16);
        let a = verifier.read_residual(&index(), &info).unwrap();
        let b = verifier.read_residual(&index(), &info).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(verifier.cached_residuals(), 1);
    }

    #[test]
    fn test_bad_shape_is_rejected() {
        let verifier = QkdService::new(NodeName::replica(2), QkdConfig::default());
        let info = MainRowInfo::for_signer(NodeName::replica(1), 0, 16);
        assert!(matches!(
            verifier.read_residual(&index(), &info),
            Err(QkdError::InvalidDimensions { .. })
        ));
    }
}
