//! Stream configuration.
//!
//! Thresholds and the polling interval are operator inputs; the defaults below are the values
//! used when nothing is configured.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;

pub const ENV_PROVIDERS: &str = "BLOCKSTREAM_PROVIDERS";
pub const ENV_POLL_INTERVAL_SECS: &str = "BLOCKSTREAM_POLL_INTERVAL_SECS";
pub const ENV_FAILURE_THRESHOLD: &str = "BLOCKSTREAM_FAILURE_THRESHOLD";
pub const ENV_HEAD_LAG_SECS: &str = "BLOCKSTREAM_HEAD_LAG_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BLOCKSTREAM_REQUEST_TIMEOUT_SECS";

/// One JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Label used in logs and in each emitted block record.
    pub name: String,
    /// HTTP JSON-RPC URL.
    pub url: String,
    /// Lower is preferred; ties keep configuration order.
    pub priority: u32,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            priority,
        }
    }
}

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub providers: Vec<ProviderConfig>,
    /// Sleep between loop iterations.
    pub poll_interval: Duration,
    /// Consecutive failed iterations before a provider is marked Failed.
    pub failure_threshold: u32,
    /// How long a provider's head may stay put before each poll counts as a failure.
    pub head_lag_threshold: Duration,
    /// Bound on each head query and each block fetch.
    pub request_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            poll_interval: Duration::from_secs(5),
            failure_threshold: 3,
            head_lag_threshold: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamConfig {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_head_lag_threshold(mut self, lag: Duration) -> Self {
        self.head_lag_threshold = lag;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider is required");
        }
        if self.failure_threshold == 0 {
            anyhow::bail!("failure threshold must be at least 1");
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request timeout must be positive");
        }
        let mut names = HashSet::new();
        for p in &self.providers {
            if p.url.is_empty() {
                anyhow::bail!("provider {} has an empty URL", p.name);
            }
            if !names.insert(p.name.as_str()) {
                anyhow::bail!("duplicate provider name {}", p.name);
            }
        }
        Ok(())
    }

    /// Load from `BLOCKSTREAM_*` environment variables (see [StreamConfig::from_lookup]).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from a key lookup. `BLOCKSTREAM_PROVIDERS` is required; the rest fall back to
    /// [StreamConfig::default].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = lookup(ENV_PROVIDERS)
            .filter(|s| !s.trim().is_empty())
            .with_context(|| format!("{} is not set", ENV_PROVIDERS))?;
        let mut config = Self::new(parse_providers(&raw)?);
        if let Some(v) = lookup(ENV_POLL_INTERVAL_SECS) {
            config.poll_interval = parse_secs(ENV_POLL_INTERVAL_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_FAILURE_THRESHOLD) {
            config.failure_threshold = v
                .trim()
                .parse()
                .with_context(|| format!("{}: not a count: {}", ENV_FAILURE_THRESHOLD, v))?;
        }
        if let Some(v) = lookup(ENV_HEAD_LAG_SECS) {
            config.head_lag_threshold = parse_secs(ENV_HEAD_LAG_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &v)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parse a comma-separated provider list. Each entry is `url`, `name=url` or
/// `name:priority=url`. Default name is `Provider{N}` (1-based); default priority is the
/// entry's position.
pub fn parse_providers(raw: &str) -> Result<Vec<ProviderConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .enumerate()
        .map(|(idx, entry)| parse_provider(idx, entry))
        .collect()
}

fn parse_provider(idx: usize, entry: &str) -> Result<ProviderConfig> {
    let position = u32::try_from(idx).context("too many providers")?;
    // A label never contains '/', so "https://host/?key=abc" stays a bare URL.
    let (label, url) = match entry.split_once('=') {
        Some((label, url)) if !label.contains('/') => (Some(label.trim()), url.trim()),
        _ => (None, entry),
    };
    let (name, priority) = match label {
        None => (format!("Provider{}", idx + 1), position),
        Some(label) => match label.split_once(':') {
            Some((name, prio)) => {
                let priority = prio
                    .trim()
                    .parse()
                    .with_context(|| format!("bad priority in provider entry {}", entry))?;
                (name.trim().to_string(), priority)
            }
            None => (label.to_string(), position),
        },
    };
    if name.is_empty() {
        anyhow::bail!("empty provider name in entry {}", entry);
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("provider {} URL must be http(s): {}", name, url);
    }
    Ok(ProviderConfig::new(name, url, priority))
}

fn parse_secs(key: &str, v: &str) -> Result<Duration> {
    let secs: f64 = v
        .trim()
        .parse()
        .with_context(|| format!("{}: not a number of seconds: {}", key, v))?;
    Duration::try_from_secs_f64(secs).with_context(|| format!("{}: out of range: {}", key, v))
}
