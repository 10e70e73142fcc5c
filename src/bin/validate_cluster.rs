//! Ops/test tool: connects to every node of a running cluster through the
//! `dev_mode`-gated introspection RPCs and checks ring-wide consistency —
//! predecessor agreement, successor-list agreement, and finger-table
//! validity — across whatever addresses are passed on the command line.

use std::env;
use std::process::ExitCode;

use tonic::transport::Channel;
use tonic::Request;

use chord::identifier::{self, Id};
use chord::rpc::chord_proto::chord_client::ChordClient;
use chord::rpc::chord_proto::{Empty, NodeInfoMsg, NodeSummaryMsg};

struct Summary {
    id: Id,
    address: String,
    predecessor: Option<String>,
    successor_list: Vec<String>,
    fingers: Vec<NodeInfoMsg>,
}

fn parse_id(msg: &NodeInfoMsg) -> Id {
    msg.id.parse().unwrap_or_else(|_| panic!("malformed ring id on the wire: {}", msg.id))
}

async fn fetch(address: &str) -> Result<Summary, Box<dyn std::error::Error>> {
    let mut client: ChordClient<Channel> = ChordClient::connect(format!("http://{address}")).await?;
    let summary: NodeSummaryMsg = client.get_node_summary(Request::new(Empty {})).await?.into_inner();
    let node = summary.node.ok_or("node summary missing its own NodeInfo")?;
    Ok(Summary {
        id: parse_id(&node),
        address: node.address,
        predecessor: summary.predecessor.map(|p| p.address),
        successor_list: summary.successor_list.map(|l| l.successors.into_iter().map(|n| n.address).collect()).unwrap_or_default(),
        fingers: summary.fingers,
    })
}

/// The node that should be responsible for `key`, deriving the answer
/// independently of any node's own finger table: the first id in sorted
/// order with `key ∈ (prev, id]`, wrapping to the smallest id otherwise.
fn responsible_for(key: Id, sorted_ids: &[Id]) -> Id {
    for &candidate in sorted_ids {
        if key <= candidate {
            return candidate;
        }
    }
    sorted_ids[0]
}

#[tokio::main]
async fn main() -> ExitCode {
    let addresses: Vec<String> = env::args().skip(1).collect();
    if addresses.is_empty() {
        eprintln!("usage: validate_cluster <node-address>...");
        return ExitCode::FAILURE;
    }

    let mut summaries = Vec::with_capacity(addresses.len());
    for address in &addresses {
        match fetch(address).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                eprintln!("could not reach {address}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    summaries.sort_by_key(|s| s.id);
    let sorted_ids: Vec<Id> = summaries.iter().map(|s| s.id).collect();
    let n = summaries.len();

    let mut ok = true;

    // Predecessor agreement: node i's predecessor should be node i-1 (mod n)
    // once the ring has converged through stabilization.
    for i in 0..n {
        let expected_pred = &summaries[(i + n - 1) % n].address;
        match &summaries[i].predecessor {
            Some(actual) if actual == expected_pred => {}
            Some(actual) => {
                ok = false;
                eprintln!("node {} ({}): predecessor is {actual}, expected {expected_pred}", summaries[i].id, summaries[i].address);
            }
            None => {
                ok = false;
                eprintln!("node {} ({}): has no predecessor, expected {expected_pred}", summaries[i].id, summaries[i].address);
            }
        }
    }

    // Successor-list agreement: the j-th entry should be the j+1-th node
    // clockwise from i.
    for i in 0..n {
        for (j, listed) in summaries[i].successor_list.iter().enumerate() {
            let expected = &summaries[(i + j + 1) % n].address;
            if listed != expected {
                ok = false;
                eprintln!(
                    "node {} ({}): successor_list[{j}] is {listed}, expected {expected}",
                    summaries[i].id, summaries[i].address
                );
            }
        }
    }

    // Finger validity: every finger should point at the node actually
    // responsible for the finger's target id.
    for summary in &summaries {
        for finger in &summary.fingers {
            let finger_id = parse_id(finger);
            let expected_owner = responsible_for(finger_id, &sorted_ids);
            if identifier::hash(finger.address.as_bytes()) != expected_owner {
                ok = false;
                eprintln!(
                    "node {} ({}): finger for {finger_id} points at {} (id {}), but {expected_owner} is responsible",
                    summary.id, summary.address, finger.address, finger_id
                );
            }
        }
    }

    if ok {
        eprintln!("cluster looks consistent across {n} node(s)");
        ExitCode::SUCCESS
    } else {
        eprintln!("cluster is inconsistent, see above");
        ExitCode::FAILURE
    }
}
