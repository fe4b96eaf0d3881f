//! # Core Identity Entities
//!
//! Names, device ids and signing-event indices used by every layer.
//!
//! ## Clusters
//!
//! - **Participants**: `NodeRole`, `NodeName`, `DeviceId`
//! - **Signing events**: `SignIndex`
//! - **Hashing**: `Hash`

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, DeserializeFromStr, SerializeDisplay};

use crate::errors::IdentityError;

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// Length of a QKD device id and of a sign task serial.
pub const ID_LEN: usize = 16;

// =============================================================================
// CLUSTER A: PARTICIPANTS
// =============================================================================

/// The two classes of participants that hold QKD key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    /// Submits transactions and receives replies (`C1`, `C2`, ...).
    Client,
    /// Consortium member taking part in agreement (`P1`, `P2`, ...).
    Replica,
}

impl NodeRole {
    fn prefix(self) -> char {
        match self {
            NodeRole::Client => 'C',
            NodeRole::Replica => 'P',
        }
    }
}

/// Name of a participant, e.g. `P3` or `C1`.
///
/// Indices start at 1. The numeric index of a replica is its PBFT node id and
/// drives the main-row assignment of the QKD service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct NodeName {
    role: NodeRole,
    index: u32,
}

impl NodeName {
    /// Replica `P<index>`.
    pub const fn replica(index: u32) -> Self {
        Self {
            role: NodeRole::Replica,
            index,
        }
    }

    /// Client `C<index>`.
    pub const fn client(index: u32) -> Self {
        Self {
            role: NodeRole::Client,
            index,
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_replica(&self) -> bool {
        self.role == NodeRole::Replica
    }

    pub fn is_client(&self) -> bool {
        self.role == NodeRole::Client
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.prefix(), self.index)
    }
}

impl FromStr for NodeName {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdentityError::InvalidNodeName(s.to_string());
        let mut chars = s.chars();
        let role = match chars.next() {
            Some('P') => NodeRole::Replica,
            Some('C') => NodeRole::Client,
            _ => return Err(invalid()),
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: u32 = digits.parse().map_err(|_| invalid())?;
        if index == 0 {
            return Err(invalid());
        }
        Ok(Self { role, index })
    }
}

/// 16-byte QKD device number of a participant.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(#[serde_as(as = "Hex")] pub [u8; ID_LEN]);

impl DeviceId {
    /// Build a device id from its configured textual form (exactly 16 bytes).
    pub fn from_ascii(text: &str) -> Result<Self, IdentityError> {
        let bytes = text.as_bytes();
        let id: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidDeviceId { len: bytes.len() })?;
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

// =============================================================================
// CLUSTER B: SIGNING EVENTS
// =============================================================================

/// Identifies one signing event: the signer's device and a per-event serial.
///
/// Every piece of key material (key matrix, Toeplitz matrix, residuals) is
/// derived from this pair, so it doubles as the key-pool lookup key.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignIndex {
    pub signer_device_id: DeviceId,
    #[serde_as(as = "Hex")]
    pub task_serial: [u8; ID_LEN],
}

impl SignIndex {
    pub fn new(signer_device_id: DeviceId, task_serial: [u8; ID_LEN]) -> Self {
        Self {
            signer_device_id,
            task_serial,
        }
    }

    /// A new signing event for `signer_device_id` with a random task serial.
    pub fn fresh(signer_device_id: DeviceId) -> Self {
        Self::new(signer_device_id, generate_task_serial())
    }

    /// Last byte of the task serial; shifts the exposed diagonal per event.
    pub fn serial_shift(&self) -> u8 {
        self.task_serial[ID_LEN - 1]
    }
}

/// Draw a 16-byte sign task serial from the OS-seeded thread RNG.
pub fn generate_task_serial() -> [u8; ID_LEN] {
    let mut serial = [0u8; ID_LEN];
    rand::thread_rng().fill_bytes(&mut serial);
    serial
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_name_parse_and_display() {
        let p3: NodeName = "P3".parse().unwrap();
        assert_eq!(p3, NodeName::replica(3));
        assert!(p3.is_replica());
        assert_eq!(p3.to_string(), "P3");

        let c12: NodeName = "C12".parse().unwrap();
        assert_eq!(c12, NodeName::client(12));
        assert!(c12.is_client());
    }

    #[test]
    fn test_node_name_rejects_malformed() {
        for bad in ["", "P", "X1", "P0", "P-1", "p1", "P1a", " P1"] {
            assert!(bad.parse::<NodeName>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_node_name_serde_as_string() {
        let json = serde_json::to_string(&NodeName::replica(4)).unwrap();
        assert_eq!(json, "\"P4\"");
        let back: NodeName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeName::replica(4));
    }

    #[test]
    fn test_device_id_from_ascii() {
        let id = DeviceId::from_ascii("XHSGDFAYQHDJ2163").unwrap();
        assert_eq!(&id.0, b"XHSGDFAYQHDJ2163");
        assert_eq!(
            DeviceId::from_ascii("short").unwrap_err(),
            IdentityError::InvalidDeviceId { len: 5 }
        );
    }

    #[test]
    fn test_sign_index_json_uses_hex() {
        let index = SignIndex::new(DeviceId([0xAB; 16]), [0x01; 16]);
        let json = serde_json::to_value(index).unwrap();
        assert_eq!(json["signer_device_id"], "abababababababababababababababab");
        assert_eq!(json["task_serial"], "01010101010101010101010101010101");
        let back: SignIndex = serde_json::from_value(json).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn test_fresh_serials_differ() {
        let device = DeviceId([7; 16]);
        let a = SignIndex::fresh(device);
        let b = SignIndex::fresh(device);
        assert_ne!(a.task_serial, b.task_serial);
        assert_eq!(a.signer_device_id, b.signer_device_id);
    }

    #[test]
    fn test_serial_shift_is_last_byte() {
        let mut serial = [0u8; 16];
        serial[15] = 0x9C;
        assert_eq!(SignIndex::new(DeviceId([0; 16]), serial).serial_shift(), 0x9C);
    }
}
