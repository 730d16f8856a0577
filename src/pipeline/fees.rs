//! Per-network fee estimates kept fresh off the evaluation path

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use crate::{
    network::{ChainStateSource, FeeEstimate},
    types::NetworkId,
    utils::Clock,
};

#[derive(Debug, Clone, Copy)]
struct CachedFee {
    fee: FeeEstimate,
    fetched_at: Instant,
}

/// Latest fee estimate per network, written by one refresher task per network and read
/// without awaiting by the evaluation workers.
pub struct FeeCache {
    fees: DashMap<NetworkId, CachedFee>,
    clock: Arc<dyn Clock>,
}

impl FeeCache {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            fees: DashMap::new(),
            clock,
        })
    }

    pub fn store(&self, network: NetworkId, fee: FeeEstimate) {
        let fetched_at = self.clock.now();
        self.fees.insert(network, CachedFee { fee, fetched_at });
    }

    /// The cached estimate for `network` if it is no older than `max_age`.
    pub fn get(&self, network: &NetworkId, max_age: Duration) -> Option<FeeEstimate> {
        let cached = *self.fees.get(network)?;
        let age = self.clock.now().saturating_duration_since(cached.fetched_at);
        (age <= max_age).then_some(cached.fee)
    }

    /// Polls `chain` every `interval`, each read bounded by `timeout`. A failed read
    /// leaves the previous estimate to age out.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        network: NetworkId,
        chain: Arc<dyn ChainStateSource>,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tokio::time::timeout(timeout, chain.fee_estimate()).await {
                    Ok(Ok(fee)) => {
                        debug!(network = %network, gas_price = fee.gas_price(), "Fee estimate refreshed");
                        cache.store(network.clone(), fee);
                    }
                    Ok(Err(e)) => warn!(network = %network, "⚠️ Fee estimate unavailable: {}", e),
                    Err(_) => warn!(network = %network, "⚠️ Fee estimate timed out after {:?}", timeout),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn fee() -> FeeEstimate {
        FeeEstimate {
            base_fee_per_gas: 9,
            priority_fee_per_gas: 1,
        }
    }

    #[test]
    fn estimates_age_out() {
        let clock = ManualClock::new();
        let cache = FeeCache::new(Arc::new(clock.clone()));
        let network = NetworkId::from("testnet");
        assert!(cache.get(&network, Duration::from_secs(6)).is_none());

        cache.store(network.clone(), fee());
        assert_eq!(cache.get(&network, Duration::from_secs(6)), Some(fee()));

        clock.advance(Duration::from_secs(7));
        assert!(cache.get(&network, Duration::from_secs(6)).is_none());
    }
}
