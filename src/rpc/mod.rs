//! The gRPC transport: generated client/server code plus the thin service
//! adapter that dispatches onto `node::Node`. This module is the "external
//! RPC transport" collaborator the protocol engine itself never reaches
//! into — everything here is wire framing and (de)serialization only.

pub mod chord_proto {
    tonic::include_proto!("chord");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("chord_descriptor");
}

pub mod conversions;
pub mod service;

pub use service::ChordRpcService;
