//! Background maintenance loop: `stabilize`, `fix_fingers` and
//! `check_predecessor` on a fixed tick, each isolated from the others'
//! failures.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use crate::node::Node;

pub struct StabilizationScheduler;

impl StabilizationScheduler {
    /// Spawns the maintenance loop and returns its handle. A tick that
    /// panics inside one routine does not stop the others from running on
    /// the next tick — each routine already swallows its own peer errors,
    /// logging rather than propagating them.
    pub fn spawn(node: Arc<Node>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !node.state().is_active() {
                    continue;
                }
                debug!("{} running stabilization tick", node.info);
                node.stabilize().await;
                node.fix_fingers().await;
                node.check_predecessor().await;
            }
        })
    }
}
