//! Block output: one record per processed block, in cursor order.

use crate::block::BlockRecord;
use serde::Serialize;
use std::io::{self, Write};

/// Output record for one processed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedBlock {
    pub block_number: u64,
    pub timestamp: u64,
    pub transaction_count: usize,
    pub provider: String,
}

impl LoggedBlock {
    pub fn new(block: &BlockRecord, provider: &str) -> Self {
        Self {
            block_number: block.number,
            timestamp: block.timestamp,
            transaction_count: block.transaction_count,
            provider: provider.to_string(),
        }
    }
}

/// Receives blocks from the cursor. Called exactly once per block number, ascending.
pub trait BlockSink {
    fn emit(&mut self, block: &BlockRecord, provider: &str) -> io::Result<()>;
}

/// Collects records in memory.
impl BlockSink for Vec<LoggedBlock> {
    fn emit(&mut self, block: &BlockRecord, provider: &str) -> io::Result<()> {
        self.push(LoggedBlock::new(block, provider));
        Ok(())
    }
}

/// Writes one JSON object per line and flushes after each block.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> BlockSink for JsonLinesSink<W> {
    fn emit(&mut self, block: &BlockRecord, provider: &str) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &LoggedBlock::new(block, provider))?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}
