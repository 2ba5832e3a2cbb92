//! StreamLoop: poll the active provider, fill the cursor up to its head, fail over on
//! sustained failure.
//!
//! Everything the loop mutates (pool, health, cursor, sink) is owned by the loop value, so one
//! task drives it without locks. A timed-out call is a failure outcome, never a cancellation
//! of the loop.

use crate::config::StreamConfig;
use crate::cursor::Cursor;
use crate::error::StreamError;
use crate::health::{FailureCause, HeadObservation, HealthMonitor, Outcome};
use crate::pool::{ProviderPool, Switch};
use crate::rpc::{with_timeout, BlockSource, HttpRpcClient};
use crate::sink::BlockSink;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// What one [StreamLoop::poll_once] did.
#[derive(Debug)]
pub struct Poll {
    /// Index of the provider that was polled.
    pub provider: usize,
    /// Head it reported, if the query succeeded.
    pub head: Option<u64>,
    /// Block numbers written this iteration.
    pub logged: Vec<u64>,
    /// `None` on success.
    pub failure: Option<FailureCause>,
    /// Set when this iteration moved the active provider.
    pub switch: Option<Switch>,
}

pub struct StreamLoop<C, K> {
    pool: ProviderPool<C>,
    cursor: Cursor,
    sink: K,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl<K: BlockSink> StreamLoop<HttpRpcClient, K> {
    /// Build HTTP clients for every configured provider.
    pub fn connect(config: &StreamConfig, sink: K) -> anyhow::Result<Self> {
        config.validate()?;
        let monitor = HealthMonitor::new(config.failure_threshold, config.head_lag_threshold);
        let pool = ProviderPool::from_configs(&config.providers, monitor, |p| {
            HttpRpcClient::new(p.url.clone(), config.request_timeout).map_err(anyhow::Error::from)
        })?;
        Ok(Self::new(
            pool,
            sink,
            config.poll_interval,
            config.request_timeout,
        ))
    }
}

impl<C: BlockSource, K: BlockSink> StreamLoop<C, K> {
    pub fn new(
        pool: ProviderPool<C>,
        sink: K,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            cursor: Cursor::new(),
            sink,
            poll_interval,
            request_timeout,
        }
    }

    /// Start from an existing cursor instead of the first observed head.
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn pool(&self) -> &ProviderPool<C> {
        &self.pool
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// One iteration: query the head on the active provider, fill the range, report a single
    /// outcome and switch provider if that outcome failed it.
    ///
    /// Errors only with [StreamError::ProviderExhausted] (before any call is made) or a sink
    /// failure.
    pub async fn poll_once(&mut self) -> Result<Poll, StreamError> {
        let provider = self.pool.current()?;
        let index = self.pool.current_index().unwrap_or_default();
        let name = provider.name.clone();

        let started = Instant::now();
        let head = match with_timeout(self.request_timeout, provider.client.block_number()).await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(provider = %name, reason = %e, "head query failed");
                let outcome = Outcome::Failure(FailureCause::Head(e));
                return Ok(self.finish(index, None, Vec::new(), outcome));
            }
        };
        let latency = started.elapsed();
        let observed_at = Instant::now();

        let advance = self
            .cursor
            .advance(
                head,
                &provider.client,
                &name,
                &mut self.sink,
                self.request_timeout,
            )
            .await?;

        let observation = self.pool.observe_head(index, head, observed_at);
        let outcome = match (advance.failed, observation) {
            (Some((number, error)), _) => Outcome::Failure(FailureCause::Block { number, error }),
            (None, HeadObservation::Stalled { since }) => {
                tracing::warn!(provider = %name, head, stalled_for = ?since, "head not advancing");
                Outcome::Failure(FailureCause::Lagging {
                    head,
                    stalled_for: since,
                })
            }
            (None, _) => Outcome::Success { latency },
        };
        tracing::debug!(provider = %name, head, logged = advance.logged.len(), "poll complete");
        Ok(self.finish(index, Some(head), advance.logged, outcome))
    }

    fn finish(
        &mut self,
        index: usize,
        head: Option<u64>,
        logged: Vec<u64>,
        outcome: Outcome,
    ) -> Poll {
        let signal = self.pool.record_outcome(index, &outcome, Instant::now());
        let switch = if signal {
            self.pool.switch_if_needed()
        } else {
            None
        };
        let failure = match outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure(cause) => Some(cause),
        };
        Poll {
            provider: index,
            head,
            logged,
            failure,
            switch,
        }
    }

    /// Poll forever, sleeping `poll_interval` after every iteration, including one that
    /// switched provider. Returns only on a fatal error.
    pub async fn run(&mut self) -> Result<(), StreamError> {
        let first = self.pool.current()?;
        tracing::info!(
            provider = %first.name,
            providers = self.pool.len(),
            poll_interval = ?self.poll_interval,
            "starting block stream"
        );
        loop {
            let poll = match self.poll_once().await {
                Ok(poll) => poll,
                Err(e) => {
                    tracing::error!(reason = %e, last_logged = ?self.cursor.last_logged(), "block stream stopped");
                    return Err(e);
                }
            };
            if let Some(to) = poll.switch.and_then(|s| s.to) {
                tracing::info!(
                    provider = %self.pool.providers()[to].name,
                    resume_from = ?self.cursor.last_logged().map(|n| n + 1),
                    "resuming on next provider"
                );
            }
            sleep(self.poll_interval).await;
        }
    }
}
