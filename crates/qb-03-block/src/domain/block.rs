//! # Blocks
//!
//! A block is the unit of agreement: the primary proposes it in a
//! pre-prepare and every message of the round refers to its digest.

use qb_02_uss::UssAuthenticator;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use shared_types::{unix_secs, Hash, NodeName};

use super::errors::BlockResult;
use super::transaction::Transaction;

/// Current block format version.
pub const BLOCK_VERSION: u32 = 1;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub version: u32,
    /// Unix seconds at packing time; also the request timestamp echoed in replies.
    pub timestamp: u64,
    pub height: u64,
    #[serde_as(as = "Hex")]
    pub prev_block_hash: Hash,
    /// Header hash computed at packing time.
    #[serde_as(as = "Hex")]
    pub hash: Hash,
    /// Node that submitted the block; replies are addressed to it.
    pub origin: NodeName,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Pack `transactions` on top of `prev_block_hash`.
    pub fn new(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash,
        height: u64,
        origin: NodeName,
    ) -> BlockResult<Self> {
        Self::with_timestamp(transactions, prev_block_hash, height, origin, unix_secs())
    }

    pub fn with_timestamp(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash,
        height: u64,
        origin: NodeName,
        timestamp: u64,
    ) -> BlockResult<Self> {
        let mut block = Self {
            version: BLOCK_VERSION,
            timestamp,
            height,
            prev_block_hash,
            hash: [0u8; 32],
            origin,
            transactions,
        };
        block.hash = block.header_hash()?;
        Ok(block)
    }

    /// Height-zero block holding one reserve transaction.
    pub fn genesis(reserve: Transaction, origin: NodeName) -> BlockResult<Self> {
        Self::with_timestamp(vec![reserve], [0u8; 32], 0, origin, 0)
    }

    /// SHA-256 over version, timestamp, height, previous hash and transaction ids.
    pub fn header_hash(&self) -> BlockResult<Hash> {
        let tx_ids: Vec<Hash> = self.transactions.iter().map(|tx| tx.id).collect();
        let header = (
            self.version,
            self.timestamp,
            self.height,
            self.prev_block_hash,
            tx_ids,
        );
        Ok(Sha256::digest(bincode::serialize(&header)?).into())
    }

    /// SHA-256 over the canonical bincode encoding of the whole block.
    pub fn digest(&self) -> BlockResult<Hash> {
        Ok(Sha256::digest(bincode::serialize(self)?).into())
    }

    /// Verify every transaction from this node's point of view.
    pub fn verify_transactions(&self, auth: &UssAuthenticator) -> BlockResult<()> {
        self.transactions
            .iter()
            .try_for_each(|tx| tx.verify_signatures(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(tag: &str) -> Transaction {
        Transaction::new_reserve(&["alice".into()], Some(tag.into())).unwrap()
    }

    #[test]
    fn test_digest_is_stable() {
        let block =
            Block::with_timestamp(vec![reserve("a")], [7; 32], 3, NodeName::replica(1), 42)
                .unwrap();
        assert_eq!(block.digest().unwrap(), block.clone().digest().unwrap());
    }

    #[test]
    fn test_digest_covers_every_field() {
        let block =
            Block::with_timestamp(vec![reserve("a")], [7; 32], 3, NodeName::replica(1), 42)
                .unwrap();
        let base = block.digest().unwrap();

        let mut other = block.clone();
        other.height = 4;
        assert_ne!(other.digest().unwrap(), base);

        let mut other = block.clone();
        other.origin = NodeName::client(1);
        assert_ne!(other.digest().unwrap(), base);

        let mut other = block.clone();
        other.transactions.push(reserve("b"));
        assert_ne!(other.digest().unwrap(), base);
    }

    #[test]
    fn test_header_hash_set_on_packing() {
        let block = Block::new(vec![reserve("a")], [0; 32], 1, NodeName::replica(1)).unwrap();
        assert_eq!(block.hash, block.header_hash().unwrap());
        assert_eq!(block.version, BLOCK_VERSION);
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::genesis(reserve("genesis"), NodeName::replica(1)).unwrap();
        let b = Block::genesis(reserve("genesis"), NodeName::replica(1)).unwrap();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.height, 0);
    }
}
