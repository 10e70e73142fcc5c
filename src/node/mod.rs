//! The protocol engine: join, routing, stabilization, and replicated
//! key-value operations. This is the core the rest of the crate exists to
//! carry.

pub mod engine;
pub mod info;
pub mod state;

pub use engine::Node;
pub use info::{Address, NodeInfo};
pub use state::NodeState;
