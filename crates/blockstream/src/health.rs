//! Per-provider health tracking and the Active → Failed transition.
//!
//! The monitor only touches [ProviderHealth]; it never sees the cursor. A failed provider stays
//! failed for the rest of the run (no cooldown, no automatic recovery).

use crate::error::RpcError;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    /// Eligible for selection.
    Active,
    /// Excluded for the rest of the run.
    Failed,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Active => write!(f, "active"),
            HealthState::Failed => write!(f, "failed"),
        }
    }
}

/// Why an iteration against a provider counted as a failure.
#[derive(Debug)]
pub enum FailureCause {
    /// The head query failed (timeout, transport, RPC error or malformed reply).
    Head(RpcError),
    /// Fetching a block inside the range failed; the cursor stopped before `number`.
    Block { number: u64, error: RpcError },
    /// The reported head has not moved for at least the lag threshold.
    Lagging { head: u64, stalled_for: Duration },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Head(e) => write!(f, "head query: {}", e),
            FailureCause::Block { number, error } => write!(f, "block {}: {}", number, error),
            FailureCause::Lagging { head, stalled_for } => {
                write!(f, "head stuck at {} for {:?}", head, stalled_for)
            }
        }
    }
}

/// Result of one loop iteration against one provider.
#[derive(Debug)]
pub enum Outcome {
    Success { latency: Duration },
    Failure(FailureCause),
}

/// How a head report compares with what the provider said before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadObservation {
    /// First report, or a higher head than last time.
    Advanced,
    /// Same (or lower) head, still within the lag threshold.
    Unchanged,
    /// Head has not advanced for at least the lag threshold.
    Stalled { since: Duration },
}

#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub last_success: Option<Instant>,
    pub last_latency: Option<Duration>,
    /// Highest head this provider has reported and when it first reported it.
    pub last_head: Option<(u64, Instant)>,
    pub total_requests: u64,
    pub successful_requests: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Active,
            consecutive_failures: 0,
            last_success: None,
            last_latency: None,
            last_head: None,
            total_requests: 0,
            successful_requests: 0,
        }
    }
}

impl ProviderHealth {
    pub fn is_active(&self) -> bool {
        self.state == HealthState::Active
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 100.0;
        }
        (self.successful_requests as f64 / self.total_requests as f64) * 100.0
    }
}

/// Decides health transitions from recorded outcomes.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    failure_threshold: u32,
    head_lag_threshold: Duration,
}

impl HealthMonitor {
    /// `failure_threshold` is clamped to at least 1.
    pub fn new(failure_threshold: u32, head_lag_threshold: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            head_lag_threshold,
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn head_lag_threshold(&self) -> Duration {
        self.head_lag_threshold
    }

    /// Track the head a provider reported at `now` and classify it against the lag threshold.
    pub fn observe_head(
        &self,
        health: &mut ProviderHealth,
        head: u64,
        now: Instant,
    ) -> HeadObservation {
        match health.last_head {
            Some((prev, since)) if head <= prev => {
                let stalled_for = now.saturating_duration_since(since);
                if stalled_for >= self.head_lag_threshold {
                    HeadObservation::Stalled { since: stalled_for }
                } else {
                    HeadObservation::Unchanged
                }
            }
            _ => {
                health.last_head = Some((head, now));
                HeadObservation::Advanced
            }
        }
    }

    /// Apply one outcome. Returns true if this call moved the provider from Active to Failed.
    pub fn record(&self, health: &mut ProviderHealth, outcome: &Outcome, now: Instant) -> bool {
        match outcome {
            Outcome::Success { latency } => {
                self.record_success(health, *latency, now);
                false
            }
            Outcome::Failure(_) => self.record_failure(health),
        }
    }

    pub fn record_success(&self, health: &mut ProviderHealth, latency: Duration, now: Instant) {
        health.total_requests += 1;
        health.successful_requests += 1;
        health.consecutive_failures = 0;
        health.last_success = Some(now);
        health.last_latency = Some(latency);
    }

    /// Count a failure. Returns true if the threshold was reached by this very failure.
    pub fn record_failure(&self, health: &mut ProviderHealth) -> bool {
        health.total_requests += 1;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        if health.state == HealthState::Active
            && health.consecutive_failures >= self.failure_threshold
        {
            health.state = HealthState::Failed;
            return true;
        }
        false
    }
}
