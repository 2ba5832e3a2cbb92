//! Prioritized provider set and active-provider selection.

use crate::config::ProviderConfig;
use crate::error::StreamError;
use crate::health::{HeadObservation, HealthMonitor, Outcome, ProviderHealth};
use tokio::time::Instant;

/// One configured endpoint, its client and its health.
#[derive(Debug)]
pub struct Provider<C> {
    pub name: String,
    pub url: String,
    /// Lower is preferred.
    pub priority: u32,
    pub client: C,
    pub health: ProviderHealth,
}

/// A change of active provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub from: Option<usize>,
    /// `None` when no eligible provider is left.
    pub to: Option<usize>,
}

/// Owns the providers and the monitor that judges them.
///
/// Selection: among providers that are not Failed, the lowest priority value wins; ties go to
/// the earlier entry in configuration order.
#[derive(Debug)]
pub struct ProviderPool<C> {
    providers: Vec<Provider<C>>,
    monitor: HealthMonitor,
    active: Option<usize>,
}

impl<C> ProviderPool<C> {
    pub fn new(
        entries: Vec<(ProviderConfig, C)>,
        monitor: HealthMonitor,
    ) -> Result<Self, StreamError> {
        if entries.is_empty() {
            return Err(StreamError::NoProviders);
        }
        let providers = entries
            .into_iter()
            .map(|(cfg, client)| Provider {
                name: cfg.name,
                url: cfg.url,
                priority: cfg.priority,
                client,
                health: ProviderHealth::default(),
            })
            .collect();
        let mut pool = Self {
            providers,
            monitor,
            active: None,
        };
        pool.active = pool.select();
        Ok(pool)
    }

    /// Build one client per configured provider.
    pub fn from_configs<E>(
        configs: &[ProviderConfig],
        monitor: HealthMonitor,
        mut connect: impl FnMut(&ProviderConfig) -> Result<C, E>,
    ) -> Result<Self, E>
    where
        E: From<StreamError>,
    {
        let mut entries = Vec::with_capacity(configs.len());
        for cfg in configs {
            entries.push((cfg.clone(), connect(cfg)?));
        }
        Ok(Self::new(entries, monitor)?)
    }

    fn select(&self) -> Option<usize> {
        self.providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.health.is_active())
            .min_by_key(|(i, p)| (p.priority, *i))
            .map(|(i, _)| i)
    }

    /// The active provider, or [StreamError::ProviderExhausted] once every provider is Failed.
    pub fn current(&self) -> Result<&Provider<C>, StreamError> {
        self.active
            .map(|i| &self.providers[i])
            .ok_or(StreamError::ProviderExhausted {
                providers: self.providers.len(),
            })
    }

    pub fn current_index(&self) -> Option<usize> {
        self.active
    }

    /// Feed an outcome for provider `index` to the monitor.
    ///
    /// Returns the switch signal: true when the active provider just transitioned to Failed.
    pub fn record_outcome(&mut self, index: usize, outcome: &Outcome, now: Instant) -> bool {
        let Some(provider) = self.providers.get_mut(index) else {
            return false;
        };
        let failed = self.monitor.record(&mut provider.health, outcome, now);
        if failed {
            tracing::warn!(
                provider = %provider.name,
                failures = provider.health.consecutive_failures,
                "provider marked failed"
            );
        }
        failed && self.active == Some(index)
    }

    /// Re-evaluate the active provider. Returns the change, if any.
    pub fn switch_if_needed(&mut self) -> Option<Switch> {
        let next = self.select();
        if next == self.active {
            return None;
        }
        let switch = Switch {
            from: self.active,
            to: next,
        };
        let from_name = switch.from.map(|i| self.providers[i].name.as_str());
        match next {
            Some(i) => tracing::warn!(
                from = from_name.unwrap_or("-"),
                to = %self.providers[i].name,
                "switching provider"
            ),
            None => tracing::error!(
                from = from_name.unwrap_or("-"),
                providers = self.providers.len(),
                "no eligible provider left"
            ),
        }
        self.active = next;
        Some(switch)
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Let the monitor track the head provider `index` reported at `now`.
    pub fn observe_head(&mut self, index: usize, head: u64, now: Instant) -> HeadObservation {
        match self.providers.get_mut(index) {
            Some(p) => self.monitor.observe_head(&mut p.health, head, now),
            None => HeadObservation::Unchanged,
        }
    }

    pub fn providers(&self) -> &[Provider<C>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
