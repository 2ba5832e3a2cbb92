//! Common helpers for integration tests.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use alloy::primitives::B256;
use anyhow::{Context, Result};
use blockstream::{
    BlockRecord, BlockSource, HealthMonitor, LoggedBlock, ProviderConfig, ProviderPool, RpcError,
    StreamLoop,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Deterministic block for `number`; every mock node serves the same chain.
pub fn block(number: u64) -> BlockRecord {
    let mut hash = [0u8; 32];
    hash[24..].copy_from_slice(&number.to_be_bytes());
    let mut parent = [0u8; 32];
    parent[24..].copy_from_slice(&number.wrapping_sub(1).to_be_bytes());
    BlockRecord {
        number,
        hash: B256::from(hash),
        parent_hash: B256::from(parent),
        timestamp: 1_700_000_000 + number * 12,
        transaction_count: (number % 7) as usize,
    }
}

#[derive(Debug, Default)]
struct NodeState {
    head: u64,
    fail_head: bool,
    hang: bool,
    missing: HashSet<u64>,
    stuck: HashSet<u64>,
    served: Vec<u64>,
    head_queries: Vec<Instant>,
}

/// In-memory node whose behaviour tests script between polls. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    state: Arc<Mutex<NodeState>>,
}

impl MockNode {
    pub fn at(head: u64) -> Self {
        let node = Self::default();
        node.set_head(head);
        node
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn head(&self) -> u64 {
        self.state.lock().unwrap().head
    }

    /// Make `eth_blockNumber` return an RPC error.
    pub fn fail_head(&self, fail: bool) {
        self.state.lock().unwrap().fail_head = fail;
    }

    /// Make `eth_blockNumber` never answer.
    pub fn hang(&self, hang: bool) {
        self.state.lock().unwrap().hang = hang;
    }

    /// Make `eth_getBlockByNumber(number)` return null.
    pub fn drop_block(&self, number: u64) {
        self.state.lock().unwrap().missing.insert(number);
    }

    pub fn restore_block(&self, number: u64) {
        self.state.lock().unwrap().missing.remove(&number);
    }

    /// Make `eth_getBlockByNumber(number)` never answer.
    pub fn hang_block(&self, number: u64) {
        self.state.lock().unwrap().stuck.insert(number);
    }

    /// When each `eth_blockNumber` call arrived.
    pub fn head_queries(&self) -> Vec<Instant> {
        self.state.lock().unwrap().head_queries.clone()
    }

    /// Block numbers this node has served, in request order.
    pub fn served(&self) -> Vec<u64> {
        self.state.lock().unwrap().served.clone()
    }
}

impl BlockSource for MockNode {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let (hang, fail, head) = {
            let mut s = self.state.lock().unwrap();
            s.head_queries.push(Instant::now());
            (s.hang, s.fail_head, s.head)
        };
        if hang {
            sleep(Duration::from_secs(3600)).await;
        }
        if fail {
            return Err(RpcError::Rpc("internal error".into()));
        }
        Ok(head)
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockRecord, RpcError> {
        let stuck = self.state.lock().unwrap().stuck.contains(&number);
        if stuck {
            sleep(Duration::from_secs(3600)).await;
        }
        let mut s = self.state.lock().unwrap();
        if number > s.head || s.missing.contains(&number) {
            return Err(RpcError::BlockNotFound(number));
        }
        s.served.push(number);
        Ok(block(number))
    }
}

/// Stream loop over mock nodes, priority = position, collecting output in memory.
pub fn stream_loop(
    nodes: &[(&str, &MockNode)],
    failure_threshold: u32,
    head_lag: Duration,
) -> StreamLoop<MockNode, Vec<LoggedBlock>> {
    let entries = nodes
        .iter()
        .enumerate()
        .map(|(i, (name, node))| {
            (
                ProviderConfig::new(*name, format!("http://{}.invalid", name), i as u32),
                (*node).clone(),
            )
        })
        .collect();
    let pool = ProviderPool::new(entries, HealthMonitor::new(failure_threshold, head_lag))
        .expect("non-empty pool");
    StreamLoop::new(pool, Vec::new(), POLL_INTERVAL, REQUEST_TIMEOUT)
}

pub fn numbers(out: &[LoggedBlock]) -> Vec<u64> {
    out.iter().map(|b| b.block_number).collect()
}

/// Panics unless `out` is strictly +1 contiguous.
pub fn assert_contiguous(out: &[LoggedBlock]) {
    for pair in out.windows(2) {
        assert_eq!(
            pair[1].block_number,
            pair[0].block_number + 1,
            "gap or repeat between {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Reqwest client that does not use system proxy (avoids SCDynamicStore panic in sandbox/CI).
fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("reqwest client")
}

async fn http_json_rpc(client: &reqwest::Client, url: &str, method: &str, params: Value, id: u64) -> Result<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    });
    let resp = client.post(url).json(&body).send().await.context("HTTP request")?;
    let resp = resp.error_for_status().context("HTTP status")?;
    let v: Value = resp.json().await.context("parse response")?;
    if let Some(err) = v.get("error") {
        anyhow::bail!("RPC error: {}", err);
    }
    v.get("result").cloned().ok_or_else(|| anyhow::anyhow!("Missing result"))
}

/// Mine n blocks (Anvil). Loops evm_mine one block at a time.
pub async fn evm_mine(http_url: &str, n: u64) -> Result<()> {
    let client = http_client();
    for _ in 0..n {
        let _ = http_json_rpc(&client, http_url, "evm_mine", json!([]), 12).await?;
    }
    Ok(())
}

/// True if `anvil` is in PATH. Live tests skip themselves otherwise.
pub fn anvil_available() -> bool {
    Command::new("anvil")
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A loopback URL nothing listens on.
pub fn dead_url() -> String {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("bind for port");
    format!("http://127.0.0.1:{}", port)
}

/// Spawn Anvil on a dynamic port and wait until ready.
pub async fn spawn_anvil() -> Result<(Child, String)> {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .context("bind for port")?;
        listener.local_addr()?.port()
    };
    let rpc_url = format!("http://127.0.0.1:{}", port);
    let mut cmd = Command::new("anvil");
    cmd.arg("--port").arg(port.to_string()).arg("--host").arg("127.0.0.1");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let process = cmd.spawn().context("spawn anvil")?;
    wait_for_rpc(&rpc_url).await?;
    Ok((process, rpc_url))
}

async fn wait_for_rpc(url: &str) -> Result<()> {
    let client = http_client();
    for _ in 0..30 {
        let ok = client
            .post(url)
            .json(&json!({"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}))
            .send()
            .await
            .is_ok();
        if ok {
            return Ok(());
        }
        sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("RPC not ready");
}
