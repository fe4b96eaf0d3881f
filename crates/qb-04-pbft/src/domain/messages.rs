//! PBFT protocol messages and their signing encodings
//!
//! Every message carries a USS signature over a fixed-width little-endian
//! encoding of its fields. The signed bytes travel inside the signature, so
//! a verifier checks both the tag and that the bytes match the fields.

use qb_02_uss::UssSignature;
use qb_03_block::Block;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_types::{Hash, NodeName};

/// Primary's proposal for a round, with the block attached.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrePrepareMsg {
    pub view: u64,
    pub sequence: u64,
    #[serde_as(as = "Hex")]
    pub digest: Hash,
    pub signature: UssSignature,
    pub request: Block,
}

impl PrePrepareMsg {
    pub fn signing_message(&self) -> Vec<u8> {
        preprepare_signing_message(self.view, self.sequence, &self.digest)
    }
}

/// PBFT Prepare message
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrepareMsg {
    pub view: u64,
    pub sequence: u64,
    #[serde_as(as = "Hex")]
    pub digest: Hash,
    pub node_id: u32,
    pub signature: UssSignature,
}

impl PrepareMsg {
    pub fn signing_message(&self) -> Vec<u8> {
        vote_signing_message(self.view, self.sequence, &self.digest, self.node_id)
    }

    pub fn sender(&self) -> NodeName {
        NodeName::replica(self.node_id)
    }
}

/// PBFT Commit message
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitMsg {
    pub view: u64,
    pub sequence: u64,
    #[serde_as(as = "Hex")]
    pub digest: Hash,
    pub node_id: u32,
    pub signature: UssSignature,
}

impl CommitMsg {
    pub fn signing_message(&self) -> Vec<u8> {
        vote_signing_message(self.view, self.sequence, &self.digest, self.node_id)
    }

    pub fn sender(&self) -> NodeName {
        NodeName::replica(self.node_id)
    }
}

/// Reply sent by each replica to the node that submitted the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMsg {
    pub view: u64,
    /// Timestamp of the request being answered.
    pub timestamp: u64,
    pub client_name: NodeName,
    pub node_id: u32,
    pub result: bool,
    pub signature: UssSignature,
}

impl ReplyMsg {
    pub fn signing_message(&self) -> Vec<u8> {
        reply_signing_message(
            self.view,
            self.timestamp,
            &self.client_name,
            self.node_id,
            self.result,
        )
    }

    pub fn sender(&self) -> NodeName {
        NodeName::replica(self.node_id)
    }
}

/// Message to be signed for PBFT pre-prepare
pub fn preprepare_signing_message(view: u64, sequence: u64, digest: &Hash) -> Vec<u8> {
    let mut message = Vec::with_capacity(48);
    message.extend_from_slice(&view.to_le_bytes());
    message.extend_from_slice(&sequence.to_le_bytes());
    message.extend_from_slice(digest);
    message
}

/// Message to be signed for PBFT prepare and commit
pub fn vote_signing_message(view: u64, sequence: u64, digest: &Hash, node_id: u32) -> Vec<u8> {
    let mut message = preprepare_signing_message(view, sequence, digest);
    message.extend_from_slice(&u64::from(node_id).to_le_bytes());
    message
}

/// Message to be signed for PBFT reply
pub fn reply_signing_message(
    view: u64,
    timestamp: u64,
    client_name: &NodeName,
    node_id: u32,
    result: bool,
) -> Vec<u8> {
    let name = client_name.to_string();
    let mut message = Vec::with_capacity(25 + name.len());
    message.extend_from_slice(&view.to_le_bytes());
    message.extend_from_slice(&timestamp.to_le_bytes());
    message.extend_from_slice(name.as_bytes());
    message.extend_from_slice(&u64::from(node_id).to_le_bytes());
    message.push(u8::from(result));
    message
}
