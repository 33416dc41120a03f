use crate::core::{errors::ClearNodeError, types::RpcResponse};
use async_trait::async_trait;

/// Remote operations exposed by a ClearNode
#[async_trait]
pub trait ClearNodeRpc {
    /// Heartbeat round trip
    async fn ping(&self) -> Result<RpcResponse, ClearNodeError>;

    /// Fetch the node configuration (broker address, supported networks)
    async fn get_config(&self) -> Result<RpcResponse, ClearNodeError>;

    /// Fetch supported assets, optionally filtered by chain id
    async fn get_assets(&self, chain_id: Option<u64>) -> Result<RpcResponse, ClearNodeError>;
}
