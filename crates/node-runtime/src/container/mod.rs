//! # Node Container
//!
//! Configuration plus the identity-bound services built from it: the QKD
//! key service and the USS authenticator of this node.

pub mod config;

use std::sync::Arc;

use qb_01_qkd_service::QkdService;
use qb_02_uss::UssAuthenticator;
use shared_types::NodeName;
use tracing::info;

pub use config::{ConfigError, ConsensusConfig, NodeConfig, PeerConfig, SecurityConfig};

/// Validated configuration and the services every worker shares.
pub struct NodeContainer {
    pub config: NodeConfig,
    pub keys: Arc<QkdService>,
    pub auth: Arc<UssAuthenticator>,
}

impl NodeContainer {
    /// Validate `config` and build the key service and authenticator.
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let device_id = config.device_id(config.node_name)?;
        let keys = Arc::new(QkdService::new(config.node_name, config.qkd()));
        let auth = UssAuthenticator::new(keys.clone(), device_id, &config.uss())
            .map_err(|_| ConfigError::InvalidDelta(config.security.verify_delta))?;

        info!(
            node = %config.node_name,
            replicas = config.replicas.len(),
            fault_tolerance = config.consensus.fault_tolerance,
            primary = %config.consensus.primary,
            "Node container initialized"
        );
        Ok(Self {
            config,
            keys,
            auth: Arc::new(auth),
        })
    }

    pub fn node_name(&self) -> NodeName {
        self.config.node_name
    }
}
