//! Error types for RPC calls and the stream loop.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single call against one provider.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("block {0} not found")]
    BlockNotFound(u64),
}

impl RpcError {
    /// True for missing or malformed data (as opposed to a transport-level failure).
    pub fn is_integrity(&self) -> bool {
        matches!(self, RpcError::Decode(_) | RpcError::BlockNotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("all {providers} providers are failed")]
    ProviderExhausted { providers: usize },
    #[error("no providers configured")]
    NoProviders,
    #[error("writing block output failed: {0}")]
    Sink(#[from] std::io::Error),
}
