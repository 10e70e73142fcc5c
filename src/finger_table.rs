//! Cached routing shortcuts: `M` slots, slot `i` caches the node responsible
//! for `self.id + 2^i`.

use std::sync::Mutex;

use crate::identifier::{self, Id, M};
use crate::node::info::NodeInfo;

/// Fixed-length array of `M` optional fingers behind its own lock, per the
/// concurrency model's one-lock-per-structure policy.
pub struct FingerTable {
    slots: Mutex<Vec<Option<NodeInfo>>>,
}

impl FingerTable {
    pub fn new() -> Self {
        FingerTable {
            slots: Mutex::new(vec![None; M as usize]),
        }
    }

    pub fn start(self_id: Id, i: u32) -> Id {
        identifier::offset(self_id, i)
    }

    pub fn set(&self, i: usize, node: NodeInfo) {
        self.slots.lock().unwrap()[i] = Some(node);
    }

    pub fn get(&self, i: usize) -> Option<NodeInfo> {
        self.slots.lock().unwrap()[i].clone()
    }

    /// Snapshot of every populated finger, used for the debug summary RPC.
    pub fn snapshot(&self) -> Vec<Option<NodeInfo>> {
        self.slots.lock().unwrap().clone()
    }

    /// Scans slots `M-1 -> 0`, returning the first non-null finger whose id
    /// lies strictly inside `(self_id, target)`. Returns `None` if no finger
    /// qualifies — the caller falls back to `successor`.
    pub fn closest_preceding_node(&self, self_id: Id, target: Id) -> Option<NodeInfo> {
        let slots = self.slots.lock().unwrap();
        for slot in slots.iter().rev() {
            if let Some(finger) = slot {
                if identifier::in_range(finger.id, self_id, target, false, false) {
                    return Some(finger.clone());
                }
            }
        }
        None
    }
}

impl Default for FingerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: Id) -> NodeInfo {
        NodeInfo { id, address: format!("addr-{id}") }
    }

    #[test]
    fn closest_preceding_node_scans_high_to_low() {
        let table = FingerTable::new();
        table.set(0, info(10));
        table.set(1, info(20));
        table.set(2, info(30));
        // target is 40, self_id is 5: both 10, 20 and 30 qualify, expect the highest (30).
        let found = table.closest_preceding_node(5, 40).unwrap();
        assert_eq!(found.id, 30);
    }

    #[test]
    fn closest_preceding_node_none_when_nothing_qualifies() {
        let table = FingerTable::new();
        table.set(0, info(100));
        assert!(table.closest_preceding_node(5, 10).is_none());
    }
}
