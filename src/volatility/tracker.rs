//! Per-pair rolling price window feeding the volatility gate

use dashmap::DashMap;
use rust_decimal::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::types::PairKey;
use crate::utils::Clock;

/// Below this many samples the window reports zero volatility.
pub const MIN_VOLATILITY_SAMPLES: usize = 5;

pub struct VolatilityCalculator {
    window: VecDeque<(Instant, Decimal)>,
    max_duration: Duration,
}

impl VolatilityCalculator {
    pub fn new(max_duration: Duration) -> Self {
        VolatilityCalculator {
            window: VecDeque::new(),
            max_duration,
        }
    }

    pub fn add_value(&mut self, price: Decimal, now: Instant) {
        self.window.push_back((now, price));

        while let Some((timestamp, _)) = self.window.front() {
            if now.saturating_duration_since(*timestamp) > self.max_duration {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Mean absolute deviation over the mean, in bps.
    pub fn volatility_bps(&self) -> u32 {
        if self.window.len() < MIN_VOLATILITY_SAMPLES {
            return 0;
        }

        let count = Decimal::from(self.window.len() as u64);
        let mean = self.window.iter().map(|(_, p)| *p).sum::<Decimal>() / count;
        if mean <= Decimal::ZERO {
            return 0;
        }
        let deviation = self.window.iter().map(|(_, p)| (*p - mean).abs()).sum::<Decimal>() / count;

        (deviation / mean * Decimal::from(10_000))
            .trunc()
            .to_u32()
            .unwrap_or(u32::MAX)
    }
}

pub struct VolatilityTracker {
    pairs: DashMap<PairKey, VolatilityCalculator>,
    clock: Arc<dyn Clock>,
}

impl VolatilityTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            pairs: DashMap::new(),
            clock,
        }
    }

    /// Records `price` and returns the pair's current volatility.
    pub fn observe(&self, pair: &PairKey, price: Decimal, window: Duration) -> u32 {
        let now = self.clock.now();
        let mut calculator = self
            .pairs
            .entry(pair.clone())
            .or_insert_with(|| VolatilityCalculator::new(window));
        calculator.max_duration = window;
        calculator.add_value(price, now);
        calculator.volatility_bps()
    }

    pub fn volatility_bps(&self, pair: &PairKey) -> u32 {
        self.pairs.get(pair).map(|c| c.volatility_bps()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;
    use crate::types::NetworkId;
    use crate::utils::ManualClock;

    fn pair() -> PairKey {
        PairKey::new(NetworkId::from("mainnet"), Address::repeat_byte(1), Address::repeat_byte(2))
    }

    #[test]
    fn flat_prices_have_no_volatility() {
        let tracker = VolatilityTracker::new(Arc::new(ManualClock::new()));
        for _ in 0..10 {
            tracker.observe(&pair(), dec!(2000), Duration::from_secs(60));
        }
        assert_eq!(tracker.volatility_bps(&pair()), 0);
    }

    #[test]
    fn alternating_prices_report_mean_absolute_deviation() {
        let tracker = VolatilityTracker::new(Arc::new(ManualClock::new()));
        let mut last = 0;
        for i in 0..6 {
            let price = if i % 2 == 0 { dec!(99) } else { dec!(101) };
            last = tracker.observe(&pair(), price, Duration::from_secs(60));
        }
        // mean 100, every sample 1 away
        assert_eq!(last, 100);
    }

    #[test]
    fn samples_expire_with_the_window() {
        let clock = ManualClock::new();
        let tracker = VolatilityTracker::new(Arc::new(clock.clone()));
        for i in 0..6 {
            let price = if i % 2 == 0 { dec!(90) } else { dec!(110) };
            tracker.observe(&pair(), price, Duration::from_secs(10));
        }
        assert!(tracker.volatility_bps(&pair()) > 0);
        clock.advance(Duration::from_secs(11));
        assert_eq!(tracker.observe(&pair(), dec!(100), Duration::from_secs(10)), 0);
    }
}
