//! `NodeInfo`: the immutable (id, address) pair peers exchange on the wire.

use std::fmt;

use crate::identifier::{self, Id};

/// An opaque transport locator, e.g. `"10.0.0.4:7000"`. The core never
/// interprets its contents beyond hashing and equality.
pub type Address = String;

/// A peer's ring identity: its hash and where to reach it. Equality and
/// ordering on the ring are both by `id` — `address` is carried along only
/// so the façade knows where to dial.
#[derive(Clone, Debug, Eq)]
pub struct NodeInfo {
    pub id: Id,
    pub address: Address,
}

impl NodeInfo {
    pub fn new(address: Address) -> Self {
        NodeInfo {
            id: identifier::hash(address.as_bytes()),
            address,
        }
    }
}

impl PartialEq for NodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_id() {
        let a = NodeInfo::new("10.0.0.1:1".into());
        let b = NodeInfo::new("10.0.0.1:1".into());
        assert_eq!(a, b);
    }
}
