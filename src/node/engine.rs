//! `Node`: owns all per-instance ring state and implements the protocol —
//! join, the iterative-lookup `find_successor`, the four stabilization
//! tasks, and the replicated key-value surface.

use std::sync::{Arc, RwLock as StdRwLock};

use log::{debug, info, warn};
use tokio::sync::RwLock as AsyncRwLock;

use crate::config::Config;
use crate::error::ChordError;
use crate::finger_table::FingerTable;
use crate::identifier::{self, Id, M};
use crate::kv::GetOutcome;
use crate::node::info::NodeInfo;
use crate::node::state::NodeState;
use crate::peer::RemotePeer;
use crate::store::Store;
use crate::successor_list::SuccessorList;

/// The mutable part of a node's ring position: successor, predecessor,
/// successor list and the fix-fingers cursor. Guarded by one lock, per the
/// concurrency model's "read snapshot, write short" discipline.
struct RingState {
    successor: NodeInfo,
    predecessor: Option<NodeInfo>,
    successor_list: SuccessorList,
    next_finger: usize,
}

pub struct Node {
    pub info: NodeInfo,
    state: StdRwLock<NodeState>,
    ring: AsyncRwLock<RingState>,
    finger_table: FingerTable,
    store: Store,
    pub config: Config,
}

/// Required quorum for a PUT to succeed: a majority of the R replicas,
/// including the primary.
fn quorum_for(r: usize) -> usize {
    (r + 1 + 1) / 2
}

impl Node {
    /// Forms a brand-new ring of one. `successor == self`, `predecessor`
    /// stays `None` until another node's `notify` arrives.
    pub fn create(info: NodeInfo, config: Config) -> Arc<Node> {
        let finger_table = FingerTable::new();
        for i in 0..M {
            finger_table.set(i as usize, info.clone());
        }
        let node = Node {
            ring: AsyncRwLock::new(RingState {
                successor: info.clone(),
                predecessor: None,
                successor_list: SuccessorList::singleton(info.clone(), config.replication_factor),
                next_finger: 0,
            }),
            state: StdRwLock::new(NodeState::Active),
            finger_table,
            store: Store::new(),
            info,
            config,
        };
        Arc::new(node)
    }

    /// Discovers the ring through `bootstrap_addr` and joins it. The actual
    /// key transfer happens later, as a side effect of the first `notify()`
    /// this node sends once it runs its first stabilize round below — not
    /// here, since nothing earlier in `join` knows the exact range to pull.
    pub async fn join(info: NodeInfo, bootstrap_addr: String, config: Config) -> Result<Arc<Node>, ChordError> {
        let node = Arc::new(Node {
            ring: AsyncRwLock::new(RingState {
                successor: info.clone(),
                predecessor: None,
                successor_list: SuccessorList::singleton(info.clone(), config.replication_factor),
                next_finger: 0,
            }),
            state: StdRwLock::new(NodeState::Joining),
            finger_table: FingerTable::new(),
            store: Store::new(),
            info,
            config,
        });

        let bootstrap = RemotePeer::new(bootstrap_addr);
        let successor = bootstrap.find_successor(node.info.id, 0, node.config.routing_timeout).await?;

        let downstream = RemotePeer::new(successor.address.clone())
            .get_successor_list(node.config.routing_timeout)
            .await
            .unwrap_or_default();
        let mut successor_list = SuccessorList::new(node.config.replication_factor);
        successor_list.refresh(node.info.id, successor.clone(), downstream);

        {
            let mut ring = node.ring.write().await;
            ring.successor = successor.clone();
            ring.successor_list = successor_list;
        }
        node.finger_table.set(0, successor);

        // Run one stabilize round before admitting client/RPC traffic: this
        // is what actually sends the first notify() to our successor and
        // gets our key range handed to us, and it is the condition the
        // Joining->Active transition is defined on.
        node.stabilize().await;

        *node.state.write().unwrap() = NodeState::Active;
        info!("{} joined the ring, successor is {}", node.info, node.ring.read().await.successor);
        Ok(node)
    }

    pub fn state(&self) -> NodeState {
        *self.state.read().unwrap()
    }

    fn require_active(&self) -> Result<(), ChordError> {
        if self.state().is_active() {
            Ok(())
        } else {
            Err(ChordError::NotJoined)
        }
    }

    pub async fn successor(&self) -> NodeInfo {
        self.ring.read().await.successor.clone()
    }

    pub async fn predecessor(&self) -> Option<NodeInfo> {
        self.ring.read().await.predecessor.clone()
    }

    pub async fn successor_list(&self) -> Vec<NodeInfo> {
        self.ring.read().await.successor_list.as_vec()
    }

    pub fn finger_snapshot(&self) -> Vec<Option<NodeInfo>> {
        self.finger_table.snapshot()
    }

    pub fn store_size(&self) -> usize {
        self.store.size()
    }

    pub fn store_debug_pairs(&self) -> Vec<(String, String)> {
        self.store
            .snapshot()
            .into_iter()
            .map(|(k, v, _)| (k, v))
            .collect()
    }

    // ---- routing -----------------------------------------------------

    /// Entry point for a fresh lookup: `hops` starts at 0.
    pub async fn find_successor(&self, id: Id) -> Result<NodeInfo, ChordError> {
        self.find_successor_hop(id, 0).await
    }

    /// One hop of the lookup, invoked either locally (hops starts at 0) or
    /// by the `FindSuccessor` RPC handler forwarding a request another node
    /// started (hops carried on the wire). The explicit counter is what
    /// makes the M-hop cap enforceable across a request that may be
    /// forwarded through several different nodes' handlers.
    pub async fn find_successor_hop(&self, id: Id, hops: u32) -> Result<NodeInfo, ChordError> {
        if hops >= M {
            return Err(ChordError::RoutingExhausted);
        }

        let successor = self.successor().await;
        if identifier::in_range(id, self.info.id, successor.id, false, true) {
            return Ok(successor);
        }

        let next = match self.finger_table.closest_preceding_node(self.info.id, id) {
            Some(n) if n.id != self.info.id => n,
            _ => return Ok(successor),
        };

        let peer = RemotePeer::new(next.address.clone());
        match peer.find_successor(id, hops + 1, self.config.routing_timeout).await {
            Ok(answer) => Ok(answer),
            // an unreachable closest-preceding node falls back to our own successor,
            // exactly as the spec's safe-fallback rule prescribes.
            Err(_) => Ok(successor),
        }
    }

    /// Local-only scan used by the `ClosestPrecedingFinger` RPC handler.
    pub fn closest_preceding_finger_local(&self, id: Id) -> NodeInfo {
        self.finger_table
            .closest_preceding_node(self.info.id, id)
            .unwrap_or_else(|| self.info.clone())
    }

    // ---- stabilization -------------------------------------------------

    /// Repairs `successor`: asks it for its predecessor, adopts that
    /// predecessor if it is a closer successor, refreshes the successor
    /// list, and sends `notify(self)`. Falls over to the next live
    /// successor-list entry if the current successor is unreachable, and to
    /// self (a ring-fragmentation event) if every entry is unreachable.
    pub async fn stabilize(&self) {
        let successor = self.successor().await;
        let peer = RemotePeer::new(successor.address.clone());

        match peer.get_predecessor(self.config.routing_timeout).await {
            Ok(Some(candidate)) => {
                if identifier::in_range(candidate.id, self.info.id, successor.id, false, false) {
                    debug!("{} adopting {} as successor (closer than {})", self.info, candidate, successor);
                    let mut ring = self.ring.write().await;
                    ring.successor = candidate.clone();
                    ring.successor_list.replace_front(candidate);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{} could not reach successor {} during stabilize: {e}", self.info, successor);
                self.fail_over_successor().await;
                return;
            }
        }

        let successor_after_adopt = self.successor().await;
        let successor_peer = RemotePeer::new(successor_after_adopt.address.clone());
        match successor_peer.get_successor_list(self.config.routing_timeout).await {
            Ok(downstream) => {
                let mut ring = self.ring.write().await;
                ring.successor_list.refresh(self.info.id, successor_after_adopt.clone(), downstream);
            }
            Err(e) => warn!("{} could not refresh successor list: {e}", self.info),
        }

        if let Err(e) = successor_peer.notify(&self.info, self.config.routing_timeout).await {
            warn!("{} could not notify successor {}: {e}", self.info, successor_after_adopt);
            self.fail_over_successor().await;
        }
    }

    /// Promotes the next live entry of `successor_list`. If every entry is
    /// unreachable, falls back to `self` and logs ring fragmentation.
    async fn fail_over_successor(&self) {
        loop {
            let candidate = {
                let mut ring = self.ring.write().await;
                ring.successor_list.drop_front_and_peek()
            };
            match candidate {
                Some(next) => {
                    let alive = RemotePeer::new(next.address.clone()).ping(self.config.ping_timeout).await;
                    if alive {
                        let mut ring = self.ring.write().await;
                        ring.successor = next.clone();
                        ring.successor_list.replace_front(next.clone());
                        self.finger_table.set(0, next.clone());
                        info!("{} failed over successor to {}", self.info, next);
                        return;
                    }
                }
                None => {
                    warn!("{}: ring fragmentation, every successor-list entry is unreachable, falling back to self", self.info);
                    let mut ring = self.ring.write().await;
                    ring.successor = self.info.clone();
                    ring.successor_list = SuccessorList::singleton(self.info.clone(), self.config.replication_factor);
                    self.finger_table.set(0, self.info.clone());
                    return;
                }
            }
        }
    }

    /// RPC handler invoked by a putative predecessor. Adopts `candidate` if
    /// it is closer than the current predecessor (or there is none yet),
    /// and pushes it the range it now owns: `(previous_predecessor_id_or_self,
    /// candidate.id]`, extracted from this node's own store and sent via
    /// `TransferKeys`. The donor never deletes the handed-off range itself —
    /// it stays available on both nodes until a later write or compaction
    /// reconciles it.
    pub async fn notify(&self, candidate: NodeInfo) {
        let previous_predecessor_id = {
            let ring = self.ring.read().await;
            match &ring.predecessor {
                None => None,
                Some(pred) => {
                    if identifier::in_range(candidate.id, pred.id, self.info.id, false, false) {
                        Some(pred.id)
                    } else {
                        return;
                    }
                }
            }
        };

        {
            let mut ring = self.ring.write().await;
            ring.predecessor = Some(candidate.clone());
        }
        debug!("{} adopted {} as predecessor", self.info, candidate);

        let range_start = previous_predecessor_id.unwrap_or(self.info.id);
        let pairs = self.store.extract_range(range_start, candidate.id);
        if pairs.is_empty() {
            return;
        }
        let wire_pairs: Vec<(String, String, u64)> = pairs.into_iter().map(|(k, v)| (k, v, 0)).collect();
        let peer = RemotePeer::new(candidate.address.clone());
        if let Err(e) = peer.transfer_keys(wire_pairs, self.config.transfer_timeout).await {
            warn!("{} could not hand off keys to new predecessor {}: {e}", self.info, candidate);
        }
    }

    /// Refreshes one finger-table slot per call, round-robin over `next_finger`.
    pub async fn fix_fingers(&self) {
        let i = {
            let mut ring = self.ring.write().await;
            let i = ring.next_finger;
            ring.next_finger = (ring.next_finger + 1) % M as usize;
            i
        };
        let target = FingerTable::start(self.info.id, i as u32);
        match self.find_successor(target).await {
            Ok(owner) => self.finger_table.set(i, owner),
            Err(e) => debug!("{} fix_fingers[{i}] failed: {e}", self.info),
        }
    }

    /// Liveness probe of the predecessor. A missed ping clears it, reopening
    /// the key range toward the ring counterclockwise.
    pub async fn check_predecessor(&self) {
        let predecessor = self.predecessor().await;
        if let Some(pred) = predecessor {
            let alive = RemotePeer::new(pred.address.clone()).ping(self.config.ping_timeout).await;
            if !alive {
                warn!("{} predecessor {} failed liveness check, clearing", self.info, pred);
                self.ring.write().await.predecessor = None;
            }
        }
    }

    // ---- local key-value surface (invoked by the RPC handlers directly) ---

    pub fn put_local(&self, key: &str, value: &str, ttl_secs: u64) {
        self.store.put(key.to_string(), value.to_string(), ttl_secs);
    }

    pub fn get_local(&self, key: &str) -> GetOutcome {
        self.store.get_with_status(key)
    }

    pub fn delete_local(&self, key: &str) -> bool {
        self.store.delete(key)
    }

    pub fn ingest_transfer(&self, pairs: Vec<(String, String, u64)>) {
        self.store.ingest(pairs);
    }

    pub fn store_snapshot(&self) -> Vec<(String, String, u64)> {
        self.store.snapshot()
    }

    // ---- client-facing replicated key-value surface -----------------------

    /// Resolves the primary and replicates to the next R-1 successors.
    /// Succeeds once at least `ceil((R+1)/2)` acknowledgments (including the
    /// primary) are collected.
    pub async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ChordError> {
        self.require_active()?;
        let r = self.config.replication_factor;
        let key_id = identifier::hash(key.as_bytes());
        let owner = self.find_successor(key_id).await.map_err(|e| e.normalize_for_client())?;
        let replica_targets = self.replicas_of(&owner).await;

        let mut successes = 0usize;
        if self.put_to(&owner, key, value, ttl_secs).await {
            successes += 1;
        }
        for target in &replica_targets {
            if self.put_to(target, key, value, ttl_secs).await {
                successes += 1;
            }
        }

        if successes >= quorum_for(r) {
            Ok(())
        } else {
            Err(ChordError::QuorumFailed)
        }
    }

    /// Resolves the replica set for an already-found `owner`: its own
    /// successor list if we are the owner, otherwise fetched over RPC.
    async fn replicas_of(&self, owner: &NodeInfo) -> Vec<NodeInfo> {
        let r = self.config.replication_factor;
        let entries = if owner.id == self.info.id {
            self.successor_list().await
        } else {
            RemotePeer::new(owner.address.clone())
                .get_successor_list(self.config.routing_timeout)
                .await
                .unwrap_or_default()
        };
        SuccessorList::from_entries(entries).replicas(r)
    }

    async fn put_to(&self, target: &NodeInfo, key: &str, value: &str, ttl_secs: u64) -> bool {
        if target.id == self.info.id {
            self.put_local(key, value, ttl_secs);
            return true;
        }
        RemotePeer::new(target.address.clone())
            .put_local(key, value, ttl_secs, self.config.routing_timeout)
            .await
            .unwrap_or(false)
    }

    /// Probes the primary then its replicas in order, returning the first hit.
    pub async fn get(&self, key: &str) -> Result<String, ChordError> {
        self.require_active()?;
        let key_id = identifier::hash(key.as_bytes());
        let owner = self.find_successor(key_id).await.map_err(|e| e.normalize_for_client())?;
        let replica_targets = self.replicas_of(&owner).await;
        let candidates: Vec<NodeInfo> = std::iter::once(owner).chain(replica_targets).collect();

        let mut any_reachable = false;
        for candidate in &candidates {
            match self.get_from(candidate, key).await {
                Some(GetOutcome::Found(value)) => return Ok(value),
                Some(GetOutcome::NotFound) | Some(GetOutcome::Expired) => any_reachable = true,
                None => {}
            }
        }

        if any_reachable {
            Err(ChordError::NotFound)
        } else {
            Err(ChordError::Unavailable)
        }
    }

    async fn get_from(&self, target: &NodeInfo, key: &str) -> Option<GetOutcome> {
        if target.id == self.info.id {
            return Some(self.get_local(key));
        }
        RemotePeer::new(target.address.clone())
            .get_local(key, self.config.routing_timeout)
            .await
            .ok()
    }

    /// Issues `delete_local` to every candidate. Succeeds iff at least one
    /// reachable candidate reported the key present and removed it;
    /// unreachable candidates are logged, not failed on.
    pub async fn delete(&self, key: &str) -> Result<bool, ChordError> {
        self.require_active()?;
        let key_id = identifier::hash(key.as_bytes());
        let owner = self.find_successor(key_id).await.map_err(|e| e.normalize_for_client())?;
        let replica_targets = self.replicas_of(&owner).await;
        let candidates: Vec<NodeInfo> = std::iter::once(owner).chain(replica_targets).collect();

        let mut deleted_somewhere = false;
        for candidate in &candidates {
            let deleted = if candidate.id == self.info.id {
                self.delete_local(key)
            } else {
                match RemotePeer::new(candidate.address.clone()).delete_local(key, self.config.routing_timeout).await {
                    Ok(success) => success,
                    Err(e) => {
                        warn!("{} could not reach {} to delete {key}: {e}", self.info, candidate);
                        false
                    }
                }
            };
            deleted_somewhere |= deleted;
        }
        Ok(deleted_somewhere)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_matches_majority_including_primary() {
        assert_eq!(quorum_for(3), 2);
        assert_eq!(quorum_for(1), 1);
        assert_eq!(quorum_for(4), 3);
        assert_eq!(quorum_for(5), 3);
    }

    #[tokio::test]
    async fn singleton_ring_resolves_every_key_to_self() {
        let info = NodeInfo::new("127.0.0.1:0".into());
        let node = Node::create(info.clone(), Config::for_tests("127.0.0.1:0".into()));
        let owner = node.find_successor(12345).await.unwrap();
        assert_eq!(owner.id, info.id);
    }

    #[tokio::test]
    async fn put_then_get_on_singleton_ring() {
        let info = NodeInfo::new("127.0.0.1:0".into());
        let node = Node::create(info, Config::for_tests("127.0.0.1:0".into()));
        node.put("foo", "bar", 0).await.unwrap();
        assert_eq!(node.get("foo").await.unwrap(), "bar");
    }

    #[tokio::test]
    async fn delete_then_get_returns_not_found() {
        let info = NodeInfo::new("127.0.0.1:0".into());
        let node = Node::create(info, Config::for_tests("127.0.0.1:0".into()));
        node.put("foo", "bar", 0).await.unwrap();
        assert!(node.delete("foo").await.unwrap());
        assert_eq!(node.get("foo").await.unwrap_err(), ChordError::NotFound);
    }

    #[tokio::test]
    async fn operations_before_active_are_rejected() {
        let info = NodeInfo::new("127.0.0.1:0".into());
        let node = Node::create(info, Config::for_tests("127.0.0.1:0".into()));
        *node.state.write().unwrap() = NodeState::Joining;
        assert_eq!(node.get("foo").await.unwrap_err(), ChordError::NotJoined);
    }
}
