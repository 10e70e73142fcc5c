//! The node's own lifecycle state machine: `Initial -> Joining -> Active ->
//! Detached`. Only `Active` nodes accept RPCs other than `Ping`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Initial,
    Joining,
    Active,
    Detached,
}

impl NodeState {
    pub fn is_active(self) -> bool {
        matches!(self, NodeState::Active)
    }
}
