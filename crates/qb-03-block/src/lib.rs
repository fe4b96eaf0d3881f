//! # Blocks and Transactions (QB-03)
//!
//! Data contracts agreed on by the PBFT state machine. Ledger storage and
//! UTXO bookkeeping live outside this workspace; only what consensus needs
//! is modelled here:
//!
//! - transaction ids and per-input USS signatures
//! - reserve (minting) transactions
//! - block packing and the block digest referenced by every PBFT message

pub mod domain;

pub use domain::block::{Block, BLOCK_VERSION};
pub use domain::errors::{BlockError, BlockResult};
pub use domain::transaction::{
    Transaction, TxInput, TxOutput, RESERVE_AMOUNT, RESERVE_OUTPUT_INDEX,
};
