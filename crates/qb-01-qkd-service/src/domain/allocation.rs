//! Main-row allocation
//!
//! Decides which diagonal offset of a signing event's key matrix a verifier
//! may read. For a replica signer `Ps` the `N-1` other replicas are mapped
//! onto distinct rows: `Pv` gets `v` when `v <= s` and `v-1` otherwise.

use serde::{Deserialize, Serialize};
use shared_types::{NodeName, NodeRole};

/// Main-row information carried next to every signature.
///
/// The signer always sends `main_row = 0`; each verifier recomputes its own
/// row from `signer_node_name` and its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainRowInfo {
    pub signer_node_name: NodeName,
    pub main_row: u32,
    pub verifier_count: u32,
    pub unit_len: u32,
}

impl MainRowInfo {
    /// Info attached by the signer at signing time.
    pub fn for_signer(signer_node_name: NodeName, verifier_count: u32, unit_len: u32) -> Self {
        Self {
            signer_node_name,
            main_row: 0,
            verifier_count,
            unit_len,
        }
    }

    /// Copy of this info with the verifier-specific row filled in.
    pub fn with_main_row(mut self, main_row: u32) -> Self {
        self.main_row = main_row;
        self
    }
}

/// Outcome of the main-row rule for one (signer, verifier) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainRow {
    /// The verifier is the signer itself and holds the full matrix.
    Signer,
    /// The verifier reads the residual diagonal shifted by this row.
    Row(u32),
}

impl MainRow {
    /// Numeric main row; the signer's own row is 0.
    pub fn value(self) -> u32 {
        match self {
            MainRow::Signer => 0,
            MainRow::Row(row) => row,
        }
    }
}

/// Main row a `verifier` uses for a signature produced by `signer`.
pub fn assign_main_row(signer: NodeName, verifier: NodeName) -> MainRow {
    if signer == verifier {
        return MainRow::Signer;
    }
    match (signer.role(), verifier.role()) {
        (_, NodeRole::Client) => MainRow::Row(0),
        (NodeRole::Client, NodeRole::Replica) => MainRow::Row(verifier.index()),
        (NodeRole::Replica, NodeRole::Replica) => {
            if verifier.index() <= signer.index() {
                MainRow::Row(verifier.index())
            } else {
                MainRow::Row(verifier.index() - 1)
            }
        }
    }
}
