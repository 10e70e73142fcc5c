//! Ordered prefix of clockwise nodes used for replication fan-out and
//! successor failover.

use std::collections::VecDeque;

use crate::node::info::NodeInfo;

/// Holds at most `capacity` distinct peers, first entry is the current
/// successor. Never contains `self`, except transiently in a one-node ring
/// where the successor list collapses to `[self]`.
#[derive(Clone)]
pub struct SuccessorList {
    entries: VecDeque<NodeInfo>,
    capacity: usize,
}

impl SuccessorList {
    pub fn new(capacity: usize) -> Self {
        SuccessorList {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn singleton(self_info: NodeInfo, capacity: usize) -> Self {
        let mut list = SuccessorList::new(capacity);
        list.entries.push_back(self_info);
        list
    }

    /// Wraps an already-resolved sequence of nodes (e.g. one fetched over
    /// `GetSuccessorList`) so it can be queried with `replicas()`.
    pub fn from_entries(entries: Vec<NodeInfo>) -> Self {
        SuccessorList {
            capacity: entries.len(),
            entries: entries.into(),
        }
    }

    pub fn as_vec(&self) -> Vec<NodeInfo> {
        self.entries.iter().cloned().collect()
    }

    /// Rebuilds the list as `[successor] + downstream`, deduping by id,
    /// dropping `self_id`, and truncating to capacity.
    pub fn refresh(&mut self, self_id: u128, successor: NodeInfo, downstream: Vec<NodeInfo>) {
        let mut rebuilt = VecDeque::with_capacity(self.capacity);
        let mut seen = std::collections::HashSet::new();
        for candidate in std::iter::once(successor).chain(downstream) {
            if candidate.id == self_id && rebuilt.len() > 0 {
                // a non-first occurrence of self means the ring has wrapped; stop.
                break;
            }
            if seen.insert(candidate.id) {
                rebuilt.push_back(candidate);
            }
            if rebuilt.len() == self.capacity {
                break;
            }
        }
        self.entries = rebuilt;
    }

    /// Drops the front entry (a dead successor) and returns the next
    /// candidate, if any, for the caller to try next.
    pub fn drop_front_and_peek(&mut self) -> Option<NodeInfo> {
        self.entries.pop_front();
        self.entries.front().cloned()
    }

    pub fn replace_front(&mut self, node: NodeInfo) {
        if self.entries.is_empty() {
            self.entries.push_back(node);
        } else {
            self.entries[0] = node;
        }
    }

    /// The first `r - 1` entries after the primary, for a replication
    /// candidate set of total size `r` (primary + these).
    pub fn replicas(&self, r: usize) -> Vec<NodeInfo> {
        self.entries.iter().take(r.saturating_sub(1)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u128) -> NodeInfo {
        NodeInfo { id, address: format!("addr-{id}") }
    }

    #[test]
    fn refresh_dedupes_and_truncates() {
        let mut list = SuccessorList::new(3);
        list.refresh(0, info(1), vec![info(2), info(2), info(3), info(4)]);
        let ids: Vec<u128> = list.as_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn refresh_drops_self_on_wraparound() {
        let mut list = SuccessorList::new(3);
        list.refresh(1, info(1), vec![info(2)]);
        // self_id == 1 occurs first (the successor itself can equal self in
        // a one-node ring) and is kept; only a *later* reappearance stops the scan.
        let ids: Vec<u128> = list.as_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn replicas_excludes_primary() {
        let mut list = SuccessorList::new(3);
        list.refresh(0, info(1), vec![info(2), info(3)]);
        let replicas = list.replicas(3);
        let ids: Vec<u128> = replicas.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn drop_front_and_peek_promotes_next() {
        let mut list = SuccessorList::new(3);
        list.refresh(0, info(1), vec![info(2), info(3)]);
        let next = list.drop_front_and_peek();
        assert_eq!(next.unwrap().id, 2);
    }
}
