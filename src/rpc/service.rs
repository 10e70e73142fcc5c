//! Thin adapter from the generated `tonic` server trait onto `node::Node`.
//! No protocol logic lives here — only wire (de)serialization and status
//! mapping.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::kv::GetOutcome;
use crate::node::Node;
use crate::rpc::chord_proto::chord_server::Chord;
use crate::rpc::chord_proto::{
    ClosestPrecedingFingerRequest, DeleteRequest, DeleteResponse, Empty, FindSuccessorRequest, GetKvStoreDataResponse,
    GetKvStoreSizeResponse, GetPredecessorResponse, GetRequest, GetResponse, GetStatus, KvPairDebugMsg, NodeInfoMsg,
    NodeSummaryMsg, NotifyRequest, NotifyResponse, PingResponse, PutRequest, PutResponse, SuccessorListMsg,
    TransferKeysRequest, TransferKeysResponse,
};

pub struct ChordRpcService {
    node: Arc<Node>,
}

impl ChordRpcService {
    pub fn new(node: Arc<Node>) -> Self {
        ChordRpcService { node }
    }

    fn require_dev_mode(&self) -> Result<(), Status> {
        if self.node.config.dev_mode {
            Ok(())
        } else {
            Err(Status::unimplemented("dev-mode introspection RPCs are disabled"))
        }
    }
}

fn parse_id(raw: &str) -> Result<u128, Status> {
    raw.parse().map_err(|_| Status::invalid_argument(format!("malformed ring id: {raw}")))
}

#[tonic::async_trait]
impl Chord for ChordRpcService {
    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        self.node.put_local(&req.key, &req.value, req.ttl_secs);
        Ok(Response::new(PutResponse { success: true, message: String::new() }))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let response = match self.node.get_local(&req.key) {
            GetOutcome::Found(value) => GetResponse { found: true, value, status: GetStatus::Ok as i32 },
            GetOutcome::NotFound => GetResponse { found: false, value: String::new(), status: GetStatus::NotFound as i32 },
            GetOutcome::Expired => GetResponse { found: false, value: String::new(), status: GetStatus::Expired as i32 },
        };
        Ok(Response::new(response))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        let success = self.node.delete_local(&req.key);
        Ok(Response::new(DeleteResponse { success }))
    }

    async fn find_successor(&self, request: Request<FindSuccessorRequest>) -> Result<Response<NodeInfoMsg>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.id)?;
        let owner = self
            .node
            .find_successor_hop(id, req.hops)
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        Ok(Response::new((&owner).into()))
    }

    async fn get_successor(&self, _request: Request<Empty>) -> Result<Response<NodeInfoMsg>, Status> {
        Ok(Response::new((&self.node.successor().await).into()))
    }

    async fn get_predecessor(&self, _request: Request<Empty>) -> Result<Response<GetPredecessorResponse>, Status> {
        let predecessor = self.node.predecessor().await;
        let response = match predecessor {
            Some(p) => GetPredecessorResponse { has_predecessor: true, predecessor: Some((&p).into()) },
            None => GetPredecessorResponse { has_predecessor: false, predecessor: None },
        };
        Ok(Response::new(response))
    }

    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<NotifyResponse>, Status> {
        let req = request.into_inner();
        let candidate_msg = req.candidate.ok_or_else(|| Status::invalid_argument("notify without a candidate"))?;
        let candidate = candidate_msg
            .try_into()
            .map_err(|e: crate::rpc::conversions::MalformedId| Status::invalid_argument(e.to_string()))?;
        self.node.notify(candidate).await;
        Ok(Response::new(NotifyResponse { success: true }))
    }

    async fn closest_preceding_finger(
        &self,
        request: Request<ClosestPrecedingFingerRequest>,
    ) -> Result<Response<NodeInfoMsg>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.id)?;
        let finger = self.node.closest_preceding_finger_local(id);
        Ok(Response::new((&finger).into()))
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<PingResponse>, Status> {
        Ok(Response::new(PingResponse { alive: true }))
    }

    async fn transfer_keys(&self, request: Request<TransferKeysRequest>) -> Result<Response<TransferKeysResponse>, Status> {
        let req = request.into_inner();
        let pairs = req.pairs.into_iter().map(|p| (p.key, p.value, p.ttl_secs)).collect();
        self.node.ingest_transfer(pairs);
        Ok(Response::new(TransferKeysResponse { success: true }))
    }

    async fn get_successor_list(&self, _request: Request<Empty>) -> Result<Response<SuccessorListMsg>, Status> {
        let successors = self.node.successor_list().await.iter().map(Into::into).collect();
        Ok(Response::new(SuccessorListMsg { successors }))
    }

    async fn get_node_summary(&self, _request: Request<Empty>) -> Result<Response<NodeSummaryMsg>, Status> {
        self.require_dev_mode()?;
        let predecessor = self.node.predecessor().await;
        let successor_list = self.node.successor_list().await.iter().map(Into::into).collect();
        let fingers = self.node.finger_snapshot().into_iter().flatten().map(|n| (&n).into()).collect();
        Ok(Response::new(NodeSummaryMsg {
            node: Some((&self.node.info).into()),
            has_predecessor: predecessor.is_some(),
            predecessor: predecessor.as_ref().map(Into::into),
            fingers,
            successor_list: Some(SuccessorListMsg { successors: successor_list }),
        }))
    }

    async fn get_kv_store_size(&self, _request: Request<Empty>) -> Result<Response<GetKvStoreSizeResponse>, Status> {
        self.require_dev_mode()?;
        Ok(Response::new(GetKvStoreSizeResponse { size: self.node.store_size() as u32 }))
    }

    async fn get_kv_store_data(&self, _request: Request<Empty>) -> Result<Response<GetKvStoreDataResponse>, Status> {
        self.require_dev_mode()?;
        let pairs = self
            .node
            .store_debug_pairs()
            .into_iter()
            .map(|(key, value)| KvPairDebugMsg { key, value })
            .collect();
        Ok(Response::new(GetKvStoreDataResponse { pairs }))
    }
}
