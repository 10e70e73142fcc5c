//! In-process multi-node integration tests, exercising real gRPC between
//! loopback `Node`s. Stabilization is driven by calling the four maintenance
//! routines directly rather than waiting on the background scheduler's
//! ticks, the same deterministic style the `figure_3b` test in the pack's
//! `FedericoCeratto-chord-dht` example uses instead of sleep-based polling.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tonic::transport::Server;

use chord::config::Config;
use chord::node::{Node, NodeInfo};
use chord::rpc::chord_proto::chord_server::ChordServer;
use chord::rpc::ChordRpcService;
use chord::ChordError;

/// Binds an ephemeral loopback port and hands back its address, freeing the
/// listener immediately so the caller can rebind it with tonic. The gap is
/// negligible on loopback within a single test process.
fn free_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local_addr").to_string()
}

fn test_config(listen_address: String, replication: usize) -> Config {
    Config {
        listen_address,
        bootstrap_address: None,
        replication_factor: replication,
        stabilize_interval: Duration::from_secs(3600), // driven manually, not by the scheduler
        dev_mode: false,
        snapshot_file: None,
        routing_timeout: Duration::from_secs(5),
        ping_timeout: Duration::from_millis(200),
        transfer_timeout: Duration::from_secs(5),
    }
}

struct TestNode {
    node: Arc<Node>,
    server: JoinHandle<()>,
}

impl TestNode {
    async fn create(replication: usize) -> TestNode {
        let address = free_address();
        let info = NodeInfo::new(address.clone());
        let config = test_config(address, replication);
        let node = Node::create(info, config.clone());
        TestNode::spawn_server(node, config).await
    }

    async fn join(bootstrap: &str, replication: usize) -> TestNode {
        let address = free_address();
        let info = NodeInfo::new(address.clone());
        let config = test_config(address, replication);
        let node = Node::join(info, bootstrap.to_string(), config.clone())
            .await
            .expect("join should succeed against a live bootstrap");
        TestNode::spawn_server(node, config).await
    }

    async fn spawn_server(node: Arc<Node>, config: Config) -> TestNode {
        let addr = config.listen_address.parse().expect("valid socket address");
        let service = ChordRpcService::new(node.clone());
        let server = tokio::spawn(async move {
            let _ = Server::builder().add_service(ChordServer::new(service)).serve(addr).await;
        });
        // give tonic a moment to bind before any peer dials it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        TestNode { node, server }
    }

    fn address(&self) -> String {
        self.node.info.address.clone()
    }

    /// Stops accepting RPCs, simulating an abrupt departure. The node's own
    /// in-memory state (and thus its replicas' copies of any keys) survives;
    /// only its reachability changes.
    fn kill(self) {
        self.server.abort();
    }
}

/// Runs enough stabilization rounds for an `n`-node ring to fully converge:
/// successor/predecessor pointers settle within one round per hop, and a
/// few extra rounds cover the successor-list and finger-table catch-up.
async fn converge(nodes: &[&TestNode]) {
    for _ in 0..(nodes.len() + 3) {
        for t in nodes {
            t.node.stabilize().await;
        }
        for t in nodes {
            t.node.check_predecessor().await;
        }
    }
    // M ticks would be needed to fully refresh every finger; a handful of
    // rounds is enough for the short chains these tests route over.
    for _ in 0..8 {
        for t in nodes {
            t.node.fix_fingers().await;
        }
    }
}

// Scenario 1: single-node PUT/GET/DELETE.
#[tokio::test]
async fn single_node_put_get_delete() {
    let a = TestNode::create(3).await;

    a.node.put("foo", "bar", 0).await.unwrap();
    assert_eq!(a.node.get("foo").await.unwrap(), "bar");
    assert!(a.node.delete("foo").await.unwrap());
    assert_eq!(a.node.get("foo").await.unwrap_err(), ChordError::NotFound);
}

// Scenario 2: three-node join and route, each node becomes its own
// successor's predecessor, and a PUT lands on exactly three nodes.
#[tokio::test]
async fn three_node_join_converges_and_replicates() {
    let a = TestNode::create(3).await;
    let b = TestNode::join(&a.address(), 3).await;
    let c = TestNode::join(&a.address(), 3).await;
    let nodes = [&a, &b, &c];

    converge(&nodes).await;

    for t in &nodes {
        let successor = t.node.successor().await;
        // every node should eventually be its own successor's predecessor.
        let successor_peer = nodes.iter().find(|n| n.node.info.id == successor.id).unwrap();
        let pred = successor_peer.node.predecessor().await.expect("successor has a predecessor");
        assert_eq!(pred.id, t.node.info.id);
    }

    a.node.put("alpha", "1", 0).await.unwrap();

    let holders = nodes.iter().filter(|t| matches!(t.node.get_local("alpha"), chord::kv::GetOutcome::Found(_))).count();
    assert_eq!(holders, 3, "key should be replicated to all three nodes in a 3-node ring with R=3");
}

// Scenario 3: lookup from a non-owner resolves through routing.
#[tokio::test]
async fn get_from_non_owner_resolves() {
    let a = TestNode::create(3).await;
    let b = TestNode::join(&a.address(), 3).await;
    let c = TestNode::join(&a.address(), 3).await;
    let d = TestNode::join(&a.address(), 3).await;
    let e = TestNode::join(&a.address(), 3).await;
    let nodes = [&a, &b, &c, &d, &e];
    converge(&nodes).await;

    a.node.put("k", "v", 0).await.unwrap();

    // ask every node, including ones that are not the primary, to GET it.
    for t in &nodes {
        assert_eq!(t.node.get("k").await.unwrap(), "v");
    }
}

// Scenario 4: primary failure, GET still succeeds off a surviving replica.
#[tokio::test]
async fn primary_failure_get_survives() {
    let a = TestNode::create(3).await;
    let b = TestNode::join(&a.address(), 3).await;
    let c = TestNode::join(&a.address(), 3).await;
    let nodes = [&a, &b, &c];
    converge(&nodes).await;

    a.node.put("x", "v", 0).await.unwrap();
    let owner_id = a.node.find_successor(chord::identifier::hash(b"x")).await.unwrap().id;

    // kill whichever node is the primary for "x".
    let (owner, survivors): (TestNode, Vec<Arc<Node>>) = {
        let mut owner = None;
        let mut survivors = Vec::new();
        for t in [a, b, c] {
            if t.node.info.id == owner_id {
                owner = Some(t);
            } else {
                survivors.push(t);
            }
        }
        (owner.unwrap(), survivors.into_iter().map(|t| t.node.clone()).collect())
    };
    owner.kill();

    // re-converge among the survivors so routing and replica pointers heal.
    for _ in 0..(survivors.len() + 3) {
        for n in &survivors {
            n.stabilize().await;
            n.check_predecessor().await;
        }
    }
    for _ in 0..8 {
        for n in &survivors {
            n.fix_fingers().await;
        }
    }

    assert_eq!(survivors[0].get("x").await.unwrap(), "v");
}

// Scenario 5: quorum failure when too few replicas are reachable.
#[tokio::test]
async fn quorum_failure_with_one_live_node() {
    let a = TestNode::create(3).await;
    let b = TestNode::join(&a.address(), 3).await;
    let nodes = [&a, &b];
    converge(&nodes).await;

    // 2 live nodes, R=3: quorum is ceil((3+1)/2) = 2, reachable by both.
    a.node.put("y", "v", 0).await.unwrap();

    b.kill();
    // with only one node left alive, quorum (2) cannot be reached.
    let result = a.node.put("z", "v", 0).await;
    assert_eq!(result.unwrap_err(), ChordError::QuorumFailed);
}

// Scenario 6: delete idempotence — a second DELETE leaves no replica
// reporting the key present.
#[tokio::test]
async fn delete_is_idempotent() {
    let a = TestNode::create(3).await;
    let b = TestNode::join(&a.address(), 3).await;
    let c = TestNode::join(&a.address(), 3).await;
    let nodes = [&a, &b, &c];
    converge(&nodes).await;

    a.node.put("x", "v", 0).await.unwrap();
    assert!(a.node.delete("x").await.unwrap());
    let _ = a.node.delete("x").await; // either outcome is acceptable per spec

    for t in &nodes {
        assert!(matches!(t.node.get_local("x"), chord::kv::GetOutcome::NotFound));
    }
}
