//! Trade size versus venue depth

use crate::utils::{bps_of, ratio_bps};

/// Largest notional allowed against `thinner_liquidity` at `max_fraction_bps`.
pub fn max_notional_for(thinner_liquidity: u128, max_fraction_bps: u32) -> u128 {
    bps_of(thinner_liquidity, max_fraction_bps)
}

/// Ok when `notional` stays within the allowed fraction of the thinner venue,
/// otherwise the utilization in bps.
pub fn check_liquidity_fraction(notional: u128, thinner_liquidity: u128, max_fraction_bps: u32) -> Result<(), u128> {
    if notional <= max_notional_for(thinner_liquidity, max_fraction_bps) {
        Ok(())
    } else {
        Err(ratio_bps(notional, thinner_liquidity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_thousand_against_eight_thousand_at_half_is_rejected() {
        let usdc = 1_000_000u128;
        let result = check_liquidity_fraction(10_000 * usdc, 8_000 * usdc, 5_000);
        assert_eq!(result, Err(12_500));
    }

    #[test]
    fn exactly_at_the_fraction_passes() {
        assert!(check_liquidity_fraction(4_000, 8_000, 5_000).is_ok());
        assert!(check_liquidity_fraction(4_001, 8_000, 5_000).is_err());
    }
}
