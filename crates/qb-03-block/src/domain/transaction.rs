//! # Transactions
//!
//! Multi-input, multi-output transactions. Every spending input is signed
//! by its owner for all replicas; reserve transactions mint funds and carry
//! no signature.

use qb_02_uss::{UssAuthenticator, UssSignature};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use shared_types::Hash;

use super::errors::{BlockError, BlockResult};

/// Amount minted to each recipient of a reserve transaction.
pub const RESERVE_AMOUNT: u64 = 20;

/// Output index marking the single input of a reserve transaction.
pub const RESERVE_OUTPUT_INDEX: i64 = -1;

/// A reference to an earlier output, plus the owner's signature over it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde_as(as = "Hex")]
    pub refer_tx_id: Vec<u8>,
    pub refer_output_index: i64,
    /// Spender, or free-form data for a reserve input.
    pub source: String,
    pub signature: Option<UssSignature>,
}

impl TxInput {
    pub fn spend(refer_tx_id: Hash, refer_output_index: i64, source: impl Into<String>) -> Self {
        Self {
            refer_tx_id: refer_tx_id.to_vec(),
            refer_output_index,
            source: source.into(),
            signature: None,
        }
    }

    /// Canonical bytes covered by the input signature.
    pub fn signing_bytes(&self) -> BlockResult<Vec<u8>> {
        let unsigned = (&self.refer_tx_id, self.refer_output_index, &self.source);
        Ok(bincode::serialize(&unsigned)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub destination: String,
}

impl TxOutput {
    pub fn new(value: u64, destination: impl Into<String>) -> Self {
        Self {
            value,
            destination: destination.into(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde_as(as = "Hex")]
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Build a transaction and compute its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> BlockResult<Self> {
        let mut tx = Self {
            id: [0u8; 32],
            inputs,
            outputs,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// Mint [`RESERVE_AMOUNT`] to every address in `to`.
    ///
    /// Without `data` a random 20-byte tag keeps reserve ids distinct.
    pub fn new_reserve(to: &[String], data: Option<String>) -> BlockResult<Self> {
        let data = data.unwrap_or_else(|| {
            let mut tag = [0u8; 20];
            rand::thread_rng().fill_bytes(&mut tag);
            hex::encode(tag)
        });
        let input = TxInput {
            refer_tx_id: Vec::new(),
            refer_output_index: RESERVE_OUTPUT_INDEX,
            source: data,
            signature: None,
        };
        let outputs = to
            .iter()
            .map(|addr| TxOutput::new(RESERVE_AMOUNT, addr.as_str()))
            .collect();
        Self::new(vec![input], outputs)
    }

    pub fn is_reserve(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].refer_tx_id.is_empty()
            && self.inputs[0].refer_output_index == RESERVE_OUTPUT_INDEX
    }

    /// SHA-256 over the transaction with the id zeroed and signatures stripped.
    pub fn compute_id(&self) -> BlockResult<Hash> {
        let mut trimmed = self.clone();
        trimmed.id = [0u8; 32];
        for input in &mut trimmed.inputs {
            input.signature = None;
        }
        let bytes = bincode::serialize(&trimmed)?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Sign every input for `verifier_count` verifiers. Reserve inputs are skipped.
    pub fn sign_inputs(
        &mut self,
        auth: &UssAuthenticator,
        verifier_count: u32,
        unit_len: u32,
    ) -> BlockResult<()> {
        if self.is_reserve() {
            return Ok(());
        }
        for input in &mut self.inputs {
            let message = input.signing_bytes()?;
            input.signature = Some(auth.sign(verifier_count, unit_len, &message)?);
        }
        Ok(())
    }

    /// Check the id and every input signature from this node's point of view.
    pub fn verify_signatures(&self, auth: &UssAuthenticator) -> BlockResult<()> {
        let expected = self.compute_id()?;
        if expected != self.id {
            return Err(BlockError::IdMismatch {
                expected: hex::encode(expected),
                actual: self.id_hex(),
            });
        }
        if self.is_reserve() {
            return Ok(());
        }
        for (input_index, input) in self.inputs.iter().enumerate() {
            let signature = input
                .signature
                .as_ref()
                .ok_or_else(|| BlockError::MissingSignature {
                    tx_id: self.id_hex(),
                    input: input_index,
                })?;
            if signature.message != input.signing_bytes()? {
                return Err(BlockError::SignedMessageMismatch {
                    tx_id: self.id_hex(),
                    input: input_index,
                });
            }
            if !auth.verify(signature) {
                return Err(BlockError::SignatureRejected {
                    tx_id: self.id_hex(),
                    input: input_index,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_shape() {
        let tx = Transaction::new_reserve(&["alice".into(), "bob".into()], None).unwrap();
        assert!(tx.is_reserve());
        assert_eq!(tx.outputs.len(), 2);
        assert!(tx.outputs.iter().all(|o| o.value == RESERVE_AMOUNT));
        assert_eq!(tx.id, tx.compute_id().unwrap());
    }

    #[test]
    fn test_random_reserve_data_gives_distinct_ids() {
        let a = Transaction::new_reserve(&["alice".into()], None).unwrap();
        let b = Transaction::new_reserve(&["alice".into()], None).unwrap();
        assert_ne!(a.id, b.id);

        let c = Transaction::new_reserve(&["alice".into()], Some("genesis".into())).unwrap();
        let d = Transaction::new_reserve(&["alice".into()], Some("genesis".into())).unwrap();
        assert_eq!(c.id, d.id);
    }

    #[test]
    fn test_spend_is_not_reserve() {
        let tx = Transaction::new(
            vec![TxInput::spend([1; 32], 0, "alice")],
            vec![TxOutput::new(5, "bob")],
        )
        .unwrap();
        assert!(!tx.is_reserve());
    }

    #[test]
    fn test_id_covers_input_fields() {
        let mut tx = Transaction::new(
            vec![TxInput::spend([1; 32], 0, "alice")],
            vec![TxOutput::new(5, "bob")],
        )
        .unwrap();
        let before = tx.compute_id().unwrap();
        tx.inputs[0].source = "mallory".into();
        assert_ne!(before, tx.compute_id().unwrap());
    }

    #[test]
    fn test_signing_bytes_cover_input_fields() {
        let a = TxInput::spend([1; 32], 0, "alice");
        let mut b = a.clone();
        b.refer_output_index = 1;
        assert_ne!(a.signing_bytes().unwrap(), b.signing_bytes().unwrap());
        assert!(a.signing_bytes().unwrap().len() < 1024);
    }

    #[test]
    fn test_json_round_trip_uses_hex_ids() {
        let tx = Transaction::new_reserve(&["alice".into()], Some("x".into())).unwrap();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["id"].as_str().unwrap().len(), 64);
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
