//! `Into` conversions between wire messages and core types. Ids cross the
//! wire as decimal strings so the format survives a future change in `M`.

use crate::node::info::NodeInfo;
use crate::rpc::chord_proto::NodeInfoMsg;

impl From<&NodeInfo> for NodeInfoMsg {
    fn from(info: &NodeInfo) -> Self {
        NodeInfoMsg {
            id: info.id.to_string(),
            address: info.address.clone(),
        }
    }
}

impl From<NodeInfo> for NodeInfoMsg {
    fn from(info: NodeInfo) -> Self {
        (&info).into()
    }
}

#[derive(Debug, Clone)]
pub struct MalformedId(pub String);

impl std::fmt::Display for MalformedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed ring id: {}", self.0)
    }
}

impl TryFrom<NodeInfoMsg> for NodeInfo {
    type Error = MalformedId;

    fn try_from(msg: NodeInfoMsg) -> Result<Self, Self::Error> {
        let id = msg.id.parse().map_err(|_| MalformedId(msg.id.clone()))?;
        Ok(NodeInfo { id, address: msg.address })
    }
}
