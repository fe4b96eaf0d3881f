//! # Inbound Ports (Driving Ports / API)

use std::sync::Arc;

use shared_types::{NodeName, SignIndex};

use crate::domain::{KeyMatrix, MainRowInfo, QkdResult, ResidualMatrix};

/// Key material of a signing event, as seen from one node.
///
/// Implementations must be thread-safe (`Send + Sync`); every PBFT worker
/// shares one instance.
pub trait QkdKeyApi: Send + Sync {
    /// Identity of the node this service answers for.
    fn node_name(&self) -> NodeName;

    /// Full `k x k` key matrix. Only the signer of `index` may use it.
    fn full_matrix(
        &self,
        index: &SignIndex,
        verifier_count: u32,
        unit_len: u32,
    ) -> QkdResult<KeyMatrix>;

    /// Residual this node may read for a signature described by `info`.
    ///
    /// The verifier's main row is recomputed from `info.signer_node_name`;
    /// the `main_row` carried in `info` is ignored.
    fn read_residual(
        &self,
        index: &SignIndex,
        info: &MainRowInfo,
    ) -> QkdResult<Arc<ResidualMatrix>>;
}
