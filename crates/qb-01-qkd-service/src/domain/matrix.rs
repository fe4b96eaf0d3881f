//! # Key Matrices
//!
//! A signing event owns a `k x k` matrix of `unit_len`-byte key cells. The
//! signer keeps the whole matrix; a verifier only ever sees one cell per row,
//! picked along a diagonal shifted by its main row and the task serial.

use serde::{Deserialize, Serialize};
use shared_types::SignIndex;

use super::errors::{check_dimensions, QkdResult};
use crate::prf::generate_random_bytes;

/// Full signing key matrix, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatrix {
    verifier_count: u32,
    unit_len: u32,
    cells: Vec<u8>,
}

impl KeyMatrix {
    /// Derive the matrix of one signing event from the shared QKD seed.
    pub fn generate(
        seed: &[u8],
        index: &SignIndex,
        verifier_count: u32,
        unit_len: u32,
    ) -> QkdResult<Self> {
        check_dimensions(verifier_count, unit_len)?;
        let k = verifier_count as usize;
        let cells = generate_random_bytes(
            seed,
            index.signer_device_id.as_bytes(),
            &index.task_serial,
            k * k,
            unit_len as usize,
        );
        Ok(Self {
            verifier_count,
            unit_len,
            cells,
        })
    }

    pub fn verifier_count(&self) -> u32 {
        self.verifier_count
    }

    pub fn unit_len(&self) -> u32 {
        self.unit_len
    }

    /// Key cell at zero-based `(row, column)`.
    pub fn cell(&self, row: usize, column: usize) -> &[u8] {
        let k = self.verifier_count as usize;
        let u = self.unit_len as usize;
        let start = (row * k + column) * u;
        &self.cells[start..start + u]
    }

    /// All `k` cells of zero-based `row`, concatenated.
    pub fn row(&self, row: usize) -> &[u8] {
        let width = self.verifier_count as usize * self.unit_len as usize;
        &self.cells[row * width..(row + 1) * width]
    }

    /// Every cell in row-major order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }
}

/// One key cell handed to a verifier. `row` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualCell {
    pub row: u32,
    pub column: u32,
    pub key: Vec<u8>,
}

/// The `k` cells a single verifier may read for one signing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualMatrix {
    pub main_row: u32,
    pub verifier_count: u32,
    pub unit_len: u32,
    pub cells: Vec<ResidualCell>,
}

impl ResidualMatrix {
    /// Pick one cell per row of `full` along the diagonal for `main_row`.
    ///
    /// Row `i` (zero-based) yields column `((i + sn[15] + main_row) mod k) + 1`.
    pub fn extract(full: &KeyMatrix, index: &SignIndex, main_row: u32) -> Self {
        let k = full.verifier_count();
        let shift = u64::from(index.serial_shift());
        let cells = (0..k)
            .map(|i| {
                let column = ((u64::from(i) + shift + u64::from(main_row)) % u64::from(k)) as u32;
                ResidualCell {
                    row: i + 1,
                    column: column + 1,
                    key: full.cell(i as usize, column as usize).to_vec(),
                }
            })
            .collect();
        Self {
            main_row,
            verifier_count: k,
            unit_len: full.unit_len(),
            cells,
        }
    }
}
