//! Turns two venue quotes into a spread observation

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::prelude::*;
use crate::config::{ScannerSettings, WatchEntry};
use crate::types::{PriceQuote, SpreadObservation};

/// Relative gap between `high` and `low` in bps, truncated.
pub fn spread_bps(high: Decimal, low: Decimal) -> u32 {
    if low <= Decimal::ZERO || high <= low {
        return 0;
    }
    ((high - low) / low * Decimal::from(10_000))
        .trunc()
        .to_u32()
        .unwrap_or(u32::MAX)
}

/// Compares two quotes for `entry`. Returns `None` when either quote is older than the
/// max age, the quotes are further apart than the max age in time or blocks, or there
/// is no gap to trade.
pub fn observe(
    entry: &WatchEntry,
    quote_x: PriceQuote,
    quote_y: PriceQuote,
    now: DateTime<Utc>,
    settings: &ScannerSettings,
) -> Option<SpreadObservation> {
    let max_age = ChronoDuration::seconds(settings.max_quote_age_secs);
    if !quote_x.is_fresh(now, max_age) || !quote_y.is_fresh(now, max_age) {
        return None;
    }
    let apart = quote_x.observed_at.signed_duration_since(quote_y.observed_at).abs();
    if apart > max_age {
        return None;
    }
    if quote_x.observed_at_block.abs_diff(quote_y.observed_at_block) > settings.max_block_age {
        return None;
    }

    // Sell the borrowed asset where it fetches the most, buy it back where it is cheapest
    let (first_leg, second_leg) = if quote_x.price >= quote_y.price {
        (quote_x, quote_y)
    } else {
        (quote_y, quote_x)
    };
    let spread_bps = spread_bps(first_leg.price, second_leg.price);
    if spread_bps == 0 {
        return None;
    }

    Some(SpreadObservation {
        watch_id: entry.id.clone(),
        pair: entry.pair(),
        first_leg,
        second_leg,
        spread_bps,
        notional: entry.notional,
        observed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;
    use crate::types::{NetworkId, VenueId, WatchId};

    fn entry() -> WatchEntry {
        WatchEntry {
            id: WatchId::from("weth-usdc"),
            network: NetworkId::from("mainnet"),
            token_a: Address::repeat_byte(1),
            token_b: Address::repeat_byte(2),
            venue_x: VenueId::from("x"),
            venue_y: VenueId::from("y"),
            notional: 1_000,
            min_profit: None,
        }
    }

    fn quote(venue: &str, price: Decimal, at: DateTime<Utc>, block: u64) -> PriceQuote {
        PriceQuote {
            network: NetworkId::from("mainnet"),
            venue: VenueId::from(venue),
            venue_address: Address::ZERO,
            token_in: Address::repeat_byte(1),
            token_out: Address::repeat_byte(2),
            price,
            available_liquidity: 1_000_000,
            observed_at_block: block,
            observed_at: at,
        }
    }

    #[test]
    fn orients_legs_by_price() {
        let now = Utc::now();
        let obs = observe(
            &entry(),
            quote("x", dec!(2000), now, 10),
            quote("y", dec!(2010), now, 10),
            now,
            &ScannerSettings::default(),
        )
        .unwrap();
        assert_eq!(obs.first_leg.venue, VenueId::from("y"));
        assert_eq!(obs.second_leg.venue, VenueId::from("x"));
        assert_eq!(obs.spread_bps, 50);
    }

    #[test]
    fn stale_quote_yields_nothing() {
        let now = Utc::now();
        let settings = ScannerSettings::default();
        let old = now - ChronoDuration::seconds(settings.max_quote_age_secs + 1);
        assert!(observe(&entry(), quote("x", dec!(2000), now, 10), quote("y", dec!(2010), old, 10), now, &settings).is_none());
    }

    #[test]
    fn quotes_from_distant_blocks_are_not_compared() {
        let now = Utc::now();
        let settings = ScannerSettings::default();
        let far = 10 + settings.max_block_age + 1;
        assert!(observe(&entry(), quote("x", dec!(2000), now, 10), quote("y", dec!(2010), now, far), now, &settings).is_none());
    }

    #[test]
    fn spread_truncates() {
        assert_eq!(spread_bps(dec!(100.0099), dec!(100)), 0);
        assert_eq!(spread_bps(dec!(100.5), dec!(100)), 50);
        assert_eq!(spread_bps(dec!(99), dec!(100)), 0);
    }
}
