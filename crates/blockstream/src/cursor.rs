//! In-memory block cursor (no disk persistence).
//!
//! Tracks the last block written to the sink and fills every number up to a new head, in
//! order. A restart begins at whatever head is observed first.

use crate::error::{RpcError, StreamError};
use crate::rpc::{with_timeout, BlockSource};
use crate::sink::BlockSink;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Cursor: last logged block. Empty until the first block is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last_logged: Option<u64>,
}

/// What one [Cursor::advance] call did.
#[derive(Debug, Default)]
pub struct Advance {
    /// Blocks written, ascending.
    pub logged: Vec<u64>,
    /// First number that could not be fetched; the cursor stopped just before it.
    pub failed: Option<(u64, RpcError)>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor that treats `number` as already logged.
    pub fn resume_after(number: u64) -> Self {
        Self {
            last_logged: Some(number),
        }
    }

    pub fn last_logged(&self) -> Option<u64> {
        self.last_logged
    }

    /// Numbers still to log for `head`: `[last + 1, head]`, or just `head` when empty.
    /// `None` if the head is not ahead of the cursor.
    pub fn pending(&self, head: u64) -> Option<RangeInclusive<u64>> {
        let from = match self.last_logged {
            Some(last) if head <= last => return None,
            Some(last) => last + 1,
            None => head,
        };
        Some(from..=head)
    }

    /// Fetch and emit every pending block up to `head`, stopping at the first fetch failure.
    ///
    /// Each block is emitted before the cursor moves onto it, so a failure leaves the cursor
    /// at the last block actually written and the next call resumes from the failed number.
    /// Sink errors are returned as [StreamError::Sink].
    pub async fn advance<S, K>(
        &mut self,
        head: u64,
        source: &S,
        provider: &str,
        sink: &mut K,
        timeout: Duration,
    ) -> Result<Advance, StreamError>
    where
        S: BlockSource,
        K: BlockSink,
    {
        let mut report = Advance::default();
        let Some(range) = self.pending(head) else {
            return Ok(report);
        };
        tracing::debug!(provider, from = *range.start(), to = *range.end(), "filling range");
        for number in range {
            match with_timeout(timeout, source.block_by_number(number)).await {
                Ok(block) => {
                    sink.emit(&block, provider)?;
                    self.last_logged = Some(number);
                    report.logged.push(number);
                }
                Err(e) => {
                    tracing::warn!(provider, block = number, reason = %e, "block fetch failed");
                    report.failed = Some((number, e));
                    break;
                }
            }
        }
        Ok(report)
    }
}
