//! Typed proxy over the gRPC transport. A `RemotePeer` is a pure value (an
//! address); it dials a fresh channel per call, so it carries no shared
//! mutable state and there is nothing to keep consistent if a peer is
//! replaced or evicted.

use std::time::Duration;

use tonic::Request;

use crate::identifier::Id;
use crate::node::info::NodeInfo;
use crate::rpc::chord_proto::chord_client::ChordClient;
use crate::rpc::chord_proto::{
    ClosestPrecedingFingerRequest, DeleteRequest, Empty, FindSuccessorRequest, GetRequest, GetStatus,
    NotifyRequest, PutRequest, TransferKeysRequest, KvPairMsg,
};

use crate::error::ChordError;
use crate::kv::GetOutcome;

pub struct RemotePeer {
    address: String,
}

impl RemotePeer {
    pub fn new(address: impl Into<String>) -> Self {
        RemotePeer { address: address.into() }
    }

    async fn connect(&self) -> Result<ChordClient<tonic::transport::Channel>, ChordError> {
        ChordClient::connect(format!("http://{}", self.address))
            .await
            .map_err(ChordError::from)
    }

    async fn with_timeout<T>(
        timeout: Duration,
        fut: impl std::future::Future<Output = Result<T, ChordError>>,
    ) -> Result<T, ChordError> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChordError::TransportError(format!("timed out after {timeout:?}"))),
        }
    }

    pub async fn find_successor(&self, id: Id, hops: u32, timeout: Duration) -> Result<NodeInfo, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client
                .find_successor(Request::new(FindSuccessorRequest { id: id.to_string(), hops }))
                .await?;
            response.into_inner().try_into().map_err(|e: crate::rpc::conversions::MalformedId| ChordError::TransportError(e.to_string()))
        })
        .await
    }

    pub async fn get_successor(&self, timeout: Duration) -> Result<NodeInfo, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.get_successor(Request::new(Empty {})).await?;
            response.into_inner().try_into().map_err(|e: crate::rpc::conversions::MalformedId| ChordError::TransportError(e.to_string()))
        })
        .await
    }

    pub async fn get_predecessor(&self, timeout: Duration) -> Result<Option<NodeInfo>, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.get_predecessor(Request::new(Empty {})).await?.into_inner();
            if !response.has_predecessor {
                return Ok(None);
            }
            let predecessor = response
                .predecessor
                .ok_or_else(|| ChordError::TransportError("has_predecessor without a predecessor field".into()))?;
            predecessor
                .try_into()
                .map(Some)
                .map_err(|e: crate::rpc::conversions::MalformedId| ChordError::TransportError(e.to_string()))
        })
        .await
    }

    pub async fn get_successor_list(&self, timeout: Duration) -> Result<Vec<NodeInfo>, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.get_successor_list(Request::new(Empty {})).await?.into_inner();
            response
                .successors
                .into_iter()
                .map(|msg| msg.try_into().map_err(|e: crate::rpc::conversions::MalformedId| ChordError::TransportError(e.to_string())))
                .collect()
        })
        .await
    }

    pub async fn notify(&self, candidate: &NodeInfo, timeout: Duration) -> Result<(), ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            client
                .notify(Request::new(NotifyRequest { candidate: Some(candidate.into()) }))
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn closest_preceding_finger(&self, id: Id, timeout: Duration) -> Result<NodeInfo, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client
                .closest_preceding_finger(Request::new(ClosestPrecedingFingerRequest { id: id.to_string() }))
                .await?;
            response.into_inner().try_into().map_err(|e: crate::rpc::conversions::MalformedId| ChordError::TransportError(e.to_string()))
        })
        .await
    }

    pub async fn ping(&self, timeout: Duration) -> Result<bool, ChordError> {
        let result = Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.ping(Request::new(Empty {})).await?;
            Ok(response.into_inner().alive)
        })
        .await;
        // unreachable is "not alive", not a propagated error, so callers can
        // treat ping as a plain liveness boolean.
        Ok(result.unwrap_or(false))
    }

    pub async fn put_local(&self, key: &str, value: &str, ttl_secs: u64, timeout: Duration) -> Result<bool, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client
                .put(Request::new(PutRequest {
                    key: key.to_string(),
                    value: value.to_string(),
                    ttl_secs,
                }))
                .await?;
            Ok(response.into_inner().success)
        })
        .await
    }

    pub async fn get_local(&self, key: &str, timeout: Duration) -> Result<GetOutcome, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.get(Request::new(GetRequest { key: key.to_string() })).await?.into_inner();
            Ok(match GetStatus::from_i32(response.status).unwrap_or(GetStatus::NotFound) {
                GetStatus::Ok if response.found => GetOutcome::Found(response.value),
                GetStatus::Expired => GetOutcome::Expired,
                _ => GetOutcome::NotFound,
            })
        })
        .await
    }

    pub async fn delete_local(&self, key: &str, timeout: Duration) -> Result<bool, ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let response = client.delete(Request::new(DeleteRequest { key: key.to_string() })).await?;
            Ok(response.into_inner().success)
        })
        .await
    }

    pub async fn transfer_keys(&self, pairs: Vec<(String, String, u64)>, timeout: Duration) -> Result<(), ChordError> {
        Self::with_timeout(timeout, async {
            let mut client = self.connect().await?;
            let pairs = pairs
                .into_iter()
                .map(|(key, value, ttl_secs)| KvPairMsg { key, value, ttl_secs })
                .collect();
            client
                .transfer_keys(Request::new(TransferKeysRequest { pairs }))
                .await?;
            Ok(())
        })
        .await
    }
}
