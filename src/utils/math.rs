//! Integer basis-point arithmetic
//!
//! Every helper works on raw smallest-unit amounts. Helpers that produce a cost round up,
//! helpers that produce a proceed round down, so rounding never flatters a trade.

use rust_decimal::prelude::*;

pub const BPS_DENOMINATOR: u128 = 10_000;

/// `amount * bps / 10_000`, rounded down.
pub fn bps_of(amount: u128, bps: u32) -> u128 {
    mul_div_floor(amount, bps as u128, BPS_DENOMINATOR)
}

/// `amount * bps / 10_000`, rounded up. Used for fees and allowances.
pub fn bps_of_ceil(amount: u128, bps: u32) -> u128 {
    mul_div_ceil(amount, bps as u128, BPS_DENOMINATOR)
}

pub fn mul_div_floor(a: u128, b: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / denominator,
        // Split to stay inside u128 for very large notionals
        None => (a / denominator)
            .saturating_mul(b)
            .saturating_add((a % denominator).saturating_mul(b) / denominator),
    }
}

pub fn mul_div_ceil(a: u128, b: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    let floor = mul_div_floor(a, b, denominator);
    let exact = a.checked_mul(b).map(|p| p % denominator == 0).unwrap_or(false);
    if exact { floor } else { floor.saturating_add(1) }
}

/// Constant-product output: `ideal` shrunk by `depth / (depth + size)`, rounded down.
pub fn constant_product_out(ideal: u128, depth: u128, size: u128) -> u128 {
    mul_div_floor(ideal, depth, depth.saturating_add(size))
}

/// Ratio of `part` to `whole` in basis points, rounded down. Zero when `whole` is zero.
pub fn ratio_bps(part: u128, whole: u128) -> u128 {
    mul_div_floor(part, BPS_DENOMINATOR, whole)
}

/// Signed profit as a return on notional in bps, rounded toward negative infinity.
pub fn return_bps(profit: i128, notional: u128) -> i128 {
    if notional == 0 {
        return 0;
    }
    let magnitude = ratio_bps(profit.unsigned_abs(), notional) as i128;
    if profit >= 0 {
        magnitude
    } else if mul_div_ceil(profit.unsigned_abs(), BPS_DENOMINATOR, notional) as i128 == magnitude {
        -magnitude
    } else {
        -magnitude - 1
    }
}

/// Convert a non-negative decimal amount to raw units, truncating the fraction.
pub fn decimal_to_units(value: Decimal) -> u128 {
    if value.is_sign_negative() {
        return 0;
    }
    value.trunc().to_u128().unwrap_or(u128::MAX)
}

pub fn units_to_decimal(units: u128) -> Decimal {
    Decimal::from_u128(units).unwrap_or(Decimal::MAX)
}

pub fn signed(units: u128) -> i128 {
    i128::try_from(units).unwrap_or(i128::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fees_round_up_and_proceeds_round_down() {
        assert_eq!(bps_of(10_001, 9), 9);
        assert_eq!(bps_of_ceil(10_001, 9), 10);
        assert_eq!(bps_of_ceil(10_000, 9), 9);
    }

    #[test]
    fn mul_div_survives_overflowing_products() {
        let big = u128::MAX / 3;
        assert_eq!(mul_div_floor(big, 10_000, 10_000), big);
    }

    #[test]
    fn constant_product_halves_at_full_depth() {
        assert_eq!(constant_product_out(2_000, 1_000, 1_000), 1_000);
        assert_eq!(constant_product_out(2_000, 1_000, 0), 2_000);
        assert_eq!(constant_product_out(2_000, 0, 0), 0);
    }

    #[test]
    fn negative_returns_floor() {
        assert_eq!(return_bps(33, 10_000), 33);
        assert_eq!(return_bps(-1, 30_000), -1);
        assert_eq!(return_bps(-3, 10_000), -3);
    }

    #[test]
    fn decimal_conversion_truncates() {
        assert_eq!(decimal_to_units(dec!(12.99)), 12);
        assert_eq!(decimal_to_units(dec!(-4)), 0);
    }
}
