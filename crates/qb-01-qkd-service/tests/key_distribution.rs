//! Key distribution across a 4-replica consortium and a client.

use std::collections::HashSet;

use proptest::prelude::*;
use qb_01_qkd_service::{MainRowInfo, QkdConfig, QkdKeyApi, QkdService};
use shared_types::{DeviceId, NodeName, SignIndex};

fn services(n: u32) -> Vec<QkdService> {
    (1..=n)
        .map(|i| QkdService::new(NodeName::replica(i), QkdConfig::default()))
        .collect()
}

#[test]
fn verifiers_of_one_replica_signature_hold_disjoint_cells() {
    let replicas = services(4);
    let signer = NodeName::replica(2);
    let index = SignIndex::new(DeviceId(*b"SIGNER-DEVICE-02"), [0x5A; 16]);
    let info = MainRowInfo::for_signer(signer, 3, 16);

    let mut seen: HashSet<(u32, u32)> = HashSet::new();
    for service in replicas.iter().filter(|s| s.node_name() != signer) {
        let residual = service.read_residual(&index, &info).unwrap();
        for cell in &residual.cells {
            assert!(
                seen.insert((cell.row, cell.column)),
                "cell shared by two verifiers"
            );
        }
    }
    assert_eq!(seen.len(), 9);
}

#[test]
fn client_signature_covers_all_replicas() {
    let replicas = services(4);
    let index = SignIndex::new(DeviceId(*b"CLIENT-DEVICE-01"), [0x07; 16]);
    let info = MainRowInfo::for_signer(NodeName::client(1), 4, 16);

    let mut seen = HashSet::new();
    for service in &replicas {
        for cell in &service.read_residual(&index, &info).unwrap().cells {
            assert!(seen.insert((cell.row, cell.column)));
        }
    }
    assert_eq!(seen.len(), 16);
}

#[test]
fn seed_change_changes_key_material() {
    let index = SignIndex::new(DeviceId([1; 16]), [2; 16]);
    let a = QkdService::new(NodeName::replica(1), QkdConfig::default());
    let b = QkdService::new(
        NodeName::replica(1),
        QkdConfig {
            seed: "another seed".into(),
            ..QkdConfig::default()
        },
    );
    assert_ne!(
        a.full_matrix(&index, 3, 16).unwrap(),
        b.full_matrix(&index, 3, 16).unwrap()
    );
}

proptest! {
    #[test]
    fn full_matrix_is_deterministic(
        device in any::<[u8; 16]>(),
        serial in any::<[u8; 16]>(),
        k in 1u32..8,
        u in 1u32..33,
    ) {
        let index = SignIndex::new(DeviceId(device), serial);
        let a = QkdService::new(NodeName::replica(1), QkdConfig::default());
        let b = QkdService::new(NodeName::client(3), QkdConfig::default());
        let ma = a.full_matrix(&index, k, u).unwrap();
        let mb = b.full_matrix(&index, k, u).unwrap();
        prop_assert_eq!(ma.as_bytes().len(), (k * k * u) as usize);
        prop_assert_eq!(ma, mb);
    }
}
