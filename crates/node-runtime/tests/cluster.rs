//! Four replicas wired through the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use node_runtime::{
    Envelope, InMemoryTransport, NodeConfig, NodeContainer, NodeRuntime, NodeStatus,
};
use qb_03_block::{Transaction, TxInput, TxOutput};
use shared_types::NodeName;
use tokio::time::timeout;

fn config_for(name: NodeName) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node_name = name;
    config.consensus.alarm_interval_ms = 20;
    config.consensus.block_interval_ms = 50;
    config
}

struct Cluster {
    nodes: Vec<NodeRuntime>,
}

impl Cluster {
    fn start() -> Self {
        let transport = Arc::new(InMemoryTransport::new());
        let nodes = (1..=4)
            .map(|i| {
                let container = NodeContainer::new(config_for(NodeName::replica(i))).unwrap();
                let runtime = NodeRuntime::start(&container, transport.clone());
                transport.register(runtime.node_name(), runtime.inbox());
                runtime
            })
            .collect();
        Self { nodes }
    }

    fn node(&self, index: u32) -> &NodeRuntime {
        &self.nodes[index as usize - 1]
    }

    async fn submit(&self, index: u32, tx: Transaction) {
        self.node(index)
            .inbox()
            .send(Envelope::Transaction(tx))
            .await
            .unwrap();
    }

    async fn wait_all(&self, done: impl Fn(&NodeStatus) -> bool + Copy) -> Vec<NodeStatus> {
        let mut statuses = Vec::new();
        for node in &self.nodes {
            let mut rx = node.status();
            let status = *timeout(Duration::from_secs(10), rx.wait_for(done))
                .await
                .expect("cluster did not converge")
                .unwrap();
            statuses.push(status);
        }
        statuses
    }

    async fn shutdown(self) {
        for node in self.nodes {
            node.shutdown().await;
        }
    }
}

fn signed_transaction(value: u64) -> Transaction {
    let mut config = NodeConfig::default();
    config.node_name = NodeName::client(1);
    let client = NodeContainer::new(config).unwrap();
    let mut tx = Transaction::new(
        vec![TxInput::spend([7; 32], value as i64, "alice")],
        vec![TxOutput::new(value, "bob")],
    )
    .unwrap();
    tx.sign_inputs(
        &client.auth,
        client.config.pbft().replica_count(),
        client.config.security.unit_len,
    )
    .unwrap();
    tx
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transaction_is_committed_by_every_replica() {
    let cluster = Cluster::start();
    cluster.submit(1, signed_transaction(20)).await;

    let statuses = cluster.wait_all(|s| s.committed_rounds >= 1).await;
    let first = statuses[0];
    assert_eq!(first.tip_height, 1);
    assert!(first.last_sequence.is_some());
    for status in &statuses {
        assert_eq!(status.tip_hash, first.tip_hash);
        assert_eq!(status.last_sequence, first.last_sequence);
    }

    // P1 packed the block, so the replies come back to it
    let mut primary = cluster.node(1).status();
    timeout(
        Duration::from_secs(10),
        primary.wait_for(|s| s.finalized_requests >= 1),
    )
    .await
    .expect("primary never saw F + 1 replies")
    .unwrap();

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backup_forwards_transactions_to_the_primary() {
    let cluster = Cluster::start();
    cluster.submit(3, signed_transaction(5)).await;

    let statuses = cluster.wait_all(|s| s.committed_rounds >= 1).await;
    assert!(statuses.iter().all(|s| s.tip_height == 1));

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn consecutive_rounds_use_consecutive_sequences() {
    let cluster = Cluster::start();

    cluster.submit(1, signed_transaction(1)).await;
    let round1 = cluster.wait_all(|s| s.committed_rounds >= 1).await;
    let sequence1 = round1[0].last_sequence.unwrap();

    cluster.submit(1, signed_transaction(2)).await;
    let round2 = cluster.wait_all(|s| s.committed_rounds >= 2).await;
    for status in &round2 {
        assert_eq!(status.last_sequence, Some(sequence1 + 1));
        assert_eq!(status.tip_height, 2);
        assert_ne!(status.tip_hash, round1[0].tip_hash);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tampered_transaction_never_starts_a_round() {
    let cluster = Cluster::start();
    let mut tx = signed_transaction(9);
    tx.outputs[0].value = 9_000;
    cluster.submit(1, tx).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    for node in &cluster.nodes {
        let status = *node.status().borrow();
        assert_eq!(status.committed_rounds, 0);
        assert!(status.is_idle());
    }

    cluster.shutdown().await;
}
