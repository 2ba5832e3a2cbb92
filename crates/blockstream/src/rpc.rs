//! Block-source capability and its HTTP JSON-RPC implementation.

use crate::block::{decode_block, parse_hex_u64, BlockRecord};
use crate::error::RpcError;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

/// Anything that can report the chain head and serve blocks by number.
///
/// The stream loop is generic over this, so tests (or another transport) can stand in for
/// [HttpRpcClient].
pub trait BlockSource {
    /// Current head block number (`eth_blockNumber`).
    fn block_number(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// Full block header data for `number` (`eth_getBlockByNumber`, hashes only).
    fn block_by_number(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<BlockRecord, RpcError>> + Send;
}

/// Bound `fut` by `limit`; an elapsed timer becomes [RpcError::Timeout].
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, RpcError>>,
) -> Result<T, RpcError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout(limit)),
    }
}

/// JSON-RPC 2.0 over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
}

impl HttpRpcClient {
    /// Build a client for `url`. `request_timeout` also bounds each HTTP exchange.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value, id: u64) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let resp = self.client.post(&self.url).json(&body).send().await?;
        let resp = resp.error_for_status()?;
        let body = resp.bytes().await?;
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| RpcError::Decode(format!("{} response is not JSON: {}", method, e)))?;
        if let Some(err) = json.get("error") {
            return Err(RpcError::Rpc(err.to_string()));
        }
        json.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Decode("Missing result".into()))
    }
}

impl BlockSource for HttpRpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_blockNumber", json!([]), 1).await?;
        let s = result
            .as_str()
            .ok_or_else(|| RpcError::Decode("blockNumber not string".into()))?;
        parse_hex_u64(s)
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockRecord, RpcError> {
        let params = json!([format!("0x{:x}", number), false]);
        let result = self.call("eth_getBlockByNumber", params, 2).await?;
        decode_block(number, &result)
    }
}
