//! # Node Configuration
//!
//! Static description of the consortium and of this node's place in it,
//! loaded once at startup.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in development defaults: four localhost replicas, one client, `F = 1`
//! 2. TOML file named by `QB_CONFIG`
//! 3. `QB_NODE_NAME` and `QB_LISTEN_ADDR`
//!
//! ## Startup Checks
//!
//! `validate()` must pass before any worker starts. Every failure here is
//! fatal; nothing in the running node re-reads the configuration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qb_01_qkd_service::{
    check_dimensions, QkdConfig, QkdError, DEFAULT_POOL_CAPACITY, DEFAULT_QKD_SEED,
};
use qb_02_uss::{UssConfig, VerifyThreshold, DEFAULT_TOEPLITZ_SEED, DEFAULT_VERIFY_DELTA};
use qb_04_pbft::PbftConfig;
use serde::{Deserialize, Serialize};
use shared_types::{DeviceId, IdentityError, NodeName};
use thiserror::Error;

/// Path of the TOML configuration file.
pub const ENV_CONFIG_PATH: &str = "QB_CONFIG";
/// Overrides `node_name`.
pub const ENV_NODE_NAME: &str = "QB_NODE_NAME";
/// Overrides `listen_addr`.
pub const ENV_LISTEN_ADDR: &str = "QB_LISTEN_ADDR";

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identity of this process (`P<n>` or `C<n>`).
    pub node_name: NodeName,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    pub consensus: ConsensusConfig,
    pub security: SecurityConfig,
    /// Consortium members, `N = 3F + 1` entries.
    pub replicas: BTreeMap<NodeName, PeerConfig>,
    /// Clients allowed to submit transactions and receive replies.
    pub clients: BTreeMap<NodeName, PeerConfig>,
}

/// Consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub view: u64,
    pub primary: NodeName,
    /// Tolerated faulty replicas (`F`).
    pub fault_tolerance: u32,
    /// Period of the dispatcher alarm that flushes buffered messages.
    pub alarm_interval_ms: u64,
    /// Period of the block clock on the primary.
    pub block_interval_ms: u64,
    /// Queued transactions needed before the block clock packs a block.
    pub block_min_transactions: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            view: 0,
            primary: NodeName::replica(1),
            fault_tolerance: 1,
            alarm_interval_ms: 200,
            block_interval_ms: 3000,
            block_min_transactions: 1,
        }
    }
}

/// Key material and signature parameters shared by the whole deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub qkd_seed: String,
    pub toeplitz_seed: String,
    /// Byte length of one key cell.
    pub unit_len: u32,
    /// Verification strictness δ in `(0, 1]`.
    pub verify_delta: f64,
    pub residual_cache_capacity: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            qkd_seed: DEFAULT_QKD_SEED.to_string(),
            toeplitz_seed: DEFAULT_TOEPLITZ_SEED.to_string(),
            unit_len: 16,
            verify_delta: DEFAULT_VERIFY_DELTA,
            residual_cache_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Address book entry of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base URL, e.g. `http://127.0.0.1:8001`.
    pub url: String,
    /// QKD device number, exactly 16 ASCII bytes.
    pub device_id: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let replicas = (1..=4)
            .map(|i| {
                let peer = PeerConfig {
                    url: format!("http://127.0.0.1:{}", 8000 + i),
                    device_id: format!("QKD-DEVICE-P{i:04}"),
                };
                (NodeName::replica(i), peer)
            })
            .collect();
        let clients = BTreeMap::from([(
            NodeName::client(1),
            PeerConfig {
                url: "http://127.0.0.1:9001".to_string(),
                device_id: "QKD-DEVICE-C0001".to_string(),
            },
        )]);

        Self {
            node_name: NodeName::replica(1),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            consensus: ConsensusConfig::default(),
            security: SecurityConfig::default(),
            replicas,
            clients,
        }
    }
}

impl NodeConfig {
    /// Defaults, then `QB_CONFIG`, then the name and address overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(
            std::env::var(ENV_NODE_NAME).ok().as_deref(),
            std::env::var(ENV_LISTEN_ADDR).ok().as_deref(),
        )?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_overrides(
        &mut self,
        node_name: Option<&str>,
        listen_addr: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = node_name {
            self.node_name = value.parse().map_err(|_| ConfigError::InvalidOverride {
                var: ENV_NODE_NAME,
                value: value.to_string(),
            })?;
        }
        if let Some(value) = listen_addr {
            self.listen_addr = value.parse().map_err(|_| ConfigError::InvalidOverride {
                var: ENV_LISTEN_ADDR,
                value: value.to_string(),
            })?;
        }
        Ok(())
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let consensus = &self.consensus;
        if consensus.fault_tolerance == 0 {
            return Err(ConfigError::ZeroFaultTolerance);
        }
        let expected = 3 * consensus.fault_tolerance as usize + 1;
        if self.replicas.len() != expected {
            return Err(ConfigError::ReplicaCount {
                expected,
                actual: self.replicas.len(),
            });
        }
        if let Some(name) = self.replicas.keys().find(|name| !name.is_replica()) {
            return Err(ConfigError::MisplacedNode(*name));
        }
        if let Some(name) = self.clients.keys().find(|name| !name.is_client()) {
            return Err(ConfigError::MisplacedNode(*name));
        }
        // Main rows are only pairwise distinct for replicas numbered 1..=N
        if let Some(missing) = (1..=expected as u32)
            .map(NodeName::replica)
            .find(|name| !self.replicas.contains_key(name))
        {
            return Err(ConfigError::ReplicaNumbering {
                missing,
                count: expected,
            });
        }
        if !consensus.primary.is_replica() || !self.replicas.contains_key(&consensus.primary) {
            return Err(ConfigError::PrimaryNotReplica(consensus.primary));
        }
        if self.peer(self.node_name).is_none() {
            return Err(ConfigError::UnknownNode(self.node_name));
        }
        for name in self.replicas.keys().chain(self.clients.keys()) {
            self.device_id(*name)?;
        }
        if consensus.alarm_interval_ms == 0 || consensus.block_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let security = &self.security;
        VerifyThreshold::new(security.verify_delta)
            .map_err(|_| ConfigError::InvalidDelta(security.verify_delta))?;
        check_dimensions(self.pbft().replica_count(), security.unit_len)?;
        Ok(())
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    pub fn pbft(&self) -> PbftConfig {
        PbftConfig {
            view: self.consensus.view,
            primary: self.consensus.primary,
            fault_tolerance: self.consensus.fault_tolerance,
            unit_len: self.security.unit_len,
        }
    }

    pub fn qkd(&self) -> QkdConfig {
        QkdConfig {
            seed: self.security.qkd_seed.clone(),
            residual_cache_capacity: self.security.residual_cache_capacity,
        }
    }

    pub fn uss(&self) -> UssConfig {
        UssConfig {
            toeplitz_seed: self.security.toeplitz_seed.clone(),
            verify_delta: self.security.verify_delta,
        }
    }

    /// Address book entry of a replica or client.
    pub fn peer(&self, name: NodeName) -> Option<&PeerConfig> {
        if name.is_replica() {
            self.replicas.get(&name)
        } else {
            self.clients.get(&name)
        }
    }

    pub fn device_id(&self, name: NodeName) -> Result<DeviceId, ConfigError> {
        let peer = self.peer(name).ok_or(ConfigError::UnknownNode(name))?;
        DeviceId::from_ascii(&peer.device_id)
            .map_err(|source| ConfigError::InvalidDeviceId { node: name, source })
    }

    /// Replicas other than this node, in index order.
    pub fn other_replicas(&self) -> Vec<NodeName> {
        self.replicas
            .keys()
            .copied()
            .filter(|name| *name != self.node_name)
            .collect()
    }

    pub fn is_primary(&self) -> bool {
        self.node_name == self.consensus.primary
    }

    pub fn alarm_interval(&self) -> Duration {
        Duration::from_millis(self.consensus.alarm_interval_ms)
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.consensus.block_interval_ms)
    }
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("Fault tolerance must be at least 1")]
    ZeroFaultTolerance,

    #[error("Expected {expected} replicas (3F + 1), found {actual}")]
    ReplicaCount { expected: usize, actual: usize },

    #[error("{0} is listed in the wrong table")]
    MisplacedNode(NodeName),

    #[error("Replicas must be numbered P1..P{count}; {missing} is absent")]
    ReplicaNumbering { missing: NodeName, count: usize },

    #[error("Primary {0} is not a configured replica")]
    PrimaryNotReplica(NodeName),

    #[error("Node {0} is not in the address book")]
    UnknownNode(NodeName),

    #[error("Device id of {node}: {source}")]
    InvalidDeviceId {
        node: NodeName,
        #[source]
        source: IdentityError,
    },

    #[error("Timer intervals must be non-zero")]
    ZeroInterval,

    #[error("Verification delta must be in (0, 1], got {0}")]
    InvalidDelta(f64),

    #[error(transparent)]
    Dimensions(#[from] QkdError),
}
