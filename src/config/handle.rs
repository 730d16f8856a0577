//! Versioned configuration snapshots behind an atomic pointer
//!
//! Components read `snapshot()` once per decision and never hold it across a
//! suspension point they care about. Updates clone, mutate and swap.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;
use super::{Config, RiskLimits};

#[derive(Debug)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub config: Config,
}

#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<ConfigSnapshot>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ConfigSnapshot { version: 1, config })),
        }
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.inner.load_full()
    }

    pub fn version(&self) -> u64 {
        self.inner.load().version
    }

    /// Apply `f` to a copy of the current config and publish it. Returns the new version.
    pub fn update<F>(&self, f: F) -> u64
    where
        F: Fn(&mut Config),
    {
        let previous = self.inner.rcu(|current| {
            let mut next = current.config.clone();
            f(&mut next);
            ConfigSnapshot {
                version: current.version + 1,
                config: next,
            }
        });
        previous.version + 1
    }

    pub fn update_risk_limits(&self, limits: RiskLimits) -> u64 {
        let version = self.update(|c| c.risk = limits.clone());
        info!(version, "Risk limits updated");
        version
    }
}
