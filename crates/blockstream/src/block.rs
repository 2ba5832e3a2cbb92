//! Block records and decoding from the JSON-RPC block object.

use crate::error::RpcError;
use alloy::primitives::B256;
use serde_json::Value;

/// A block as fetched from a provider. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub transaction_count: usize,
}

/// Decode an `eth_getBlockByNumber` result (hashes-only transactions) into a [BlockRecord].
///
/// A `null` result means the provider does not have the block yet; it maps to
/// [RpcError::BlockNotFound] so the caller can retry the same number.
pub fn decode_block(requested: u64, block: &Value) -> Result<BlockRecord, RpcError> {
    if block.is_null() {
        return Err(RpcError::BlockNotFound(requested));
    }
    let number = parse_hex_u64(str_field(block, "number")?)?;
    if number != requested {
        return Err(RpcError::Decode(format!(
            "asked for block {} but got {}",
            requested, number
        )));
    }
    let hash = parse_b256(str_field(block, "hash")?)?;
    let parent_hash = parse_b256(str_field(block, "parentHash")?)?;
    let timestamp = parse_hex_u64(str_field(block, "timestamp")?)?;
    let transaction_count = block
        .get("transactions")
        .and_then(|t| t.as_array())
        .map(|t| t.len())
        .ok_or_else(|| RpcError::Decode("Missing transactions".into()))?;
    Ok(BlockRecord {
        number,
        hash,
        parent_hash,
        timestamp,
        transaction_count,
    })
}

fn str_field<'a>(v: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    v.get(name)
        .and_then(|f| f.as_str())
        .ok_or_else(|| RpcError::Decode(format!("Missing {}", name)))
}

/// Parse a JSON-RPC hex quantity (`0x1b4`).
pub fn parse_hex_u64(s: &str) -> Result<u64, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Decode(format!("quantity without 0x prefix: {}", s)))?;
    u64::from_str_radix(digits, 16).map_err(|e| RpcError::Decode(format!("{}: {}", s, e)))
}

fn parse_b256(s: &str) -> Result<B256, RpcError> {
    s.parse::<B256>()
        .map_err(|e| RpcError::Decode(format!("bad 32-byte hash {}: {}", s, e)))
}
