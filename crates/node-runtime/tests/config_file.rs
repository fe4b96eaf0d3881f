//! Loading node configuration from TOML files.

use std::io::Write;

use node_runtime::{ConfigError, NodeConfig};
use shared_types::NodeName;

const CONSORTIUM: &str = r#"
node_name = "P2"
listen_addr = "0.0.0.0:8102"

[consensus]
primary = "P1"
fault_tolerance = 1
alarm_interval_ms = 100

[security]
qkd_seed = "lab seed"
verify_delta = 0.9

[replicas.P1]
url = "http://10.0.0.1:8001"
device_id = "LAB-QKD-DEVICE01"

[replicas.P2]
url = "http://10.0.0.2:8001"
device_id = "LAB-QKD-DEVICE02"

[replicas.P3]
url = "http://10.0.0.3:8001"
device_id = "LAB-QKD-DEVICE03"

[replicas.P4]
url = "http://10.0.0.4:8001"
device_id = "LAB-QKD-DEVICE04"

[clients.C1]
url = "http://10.0.1.1:9001"
device_id = "LAB-QKD-CLIENT01"
"#;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn consortium_file_loads_and_validates() {
    let file = write_config(CONSORTIUM);
    let config = NodeConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.node_name, NodeName::replica(2));
    assert!(!config.is_primary());
    assert_eq!(config.consensus.alarm_interval_ms, 100);
    // Unset fields keep their defaults
    assert_eq!(config.consensus.block_interval_ms, 3000);
    assert_eq!(config.security.unit_len, 16);
    assert_eq!(config.security.qkd_seed, "lab seed");
    assert_eq!(
        config.device_id(NodeName::client(1)).unwrap().as_bytes(),
        b"LAB-QKD-CLIENT01"
    );
    assert_eq!(config.other_replicas().len(), 3);
}

#[test]
fn missing_replica_fails_validation() {
    let text = CONSORTIUM.replace("[replicas.P4]", "[clients.C4]");
    let file = write_config(&text);
    let config = NodeConfig::from_file(file.path()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ReplicaCount {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn malformed_node_name_is_a_parse_error() {
    let text = CONSORTIUM.replace("node_name = \"P2\"", "node_name = \"Q2\"");
    let file = write_config(&text);
    assert!(matches!(
        NodeConfig::from_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = NodeConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
