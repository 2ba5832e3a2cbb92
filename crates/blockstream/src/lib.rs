//! Head-following block stream over a prioritized set of JSON-RPC providers.
//!
//! - **StreamLoop**: polls the active provider's head on a fixed interval and writes every new
//!   block exactly once, in ascending order, to a [BlockSink].
//! - **Cursor**: gap-fill from the last logged block to the reported head; a failed fetch
//!   leaves the cursor on the last written block so the next iteration (possibly on another
//!   provider) resumes there.
//! - **ProviderPool** / **HealthMonitor**: Active/Failed state per provider; a provider is
//!   failed after `failure_threshold` consecutive failed iterations (errors, timeouts, bad
//!   data or a head stuck for `head_lag_threshold`) and the next eligible provider takes over.
//!   When none is left the loop stops with [StreamError::ProviderExhausted].
//!
//! No reorg handling, no cursor persistence, no push subscriptions.

pub mod block;
pub mod config;
pub mod cursor;
pub mod error;
pub mod health;
pub mod pool;
pub mod rpc;
pub mod sink;
pub mod stream;

pub use block::{decode_block, BlockRecord};
pub use config::{ProviderConfig, StreamConfig};
pub use cursor::{Advance, Cursor};
pub use error::{RpcError, StreamError};
pub use health::{
    FailureCause, HeadObservation, HealthMonitor, HealthState, Outcome, ProviderHealth,
};
pub use pool::{Provider, ProviderPool, Switch};
pub use rpc::{with_timeout, BlockSource, HttpRpcClient};
pub use sink::{BlockSink, JsonLinesSink, LoggedBlock};
pub use stream::{Poll, StreamLoop};
