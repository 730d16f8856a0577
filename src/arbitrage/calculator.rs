//! Net-profit arithmetic for a spread observation

use serde::Serialize;
use crate::config::ExecutionSettings;
use crate::utils::{bps_of, bps_of_ceil, constant_product_out, mul_div_ceil, signed};

const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfitEstimate {
    pub gross_profit: u128,
    pub gas_cost: u128,
    pub flash_loan_fee: u128,
    pub slippage_allowance: u128,
    pub net_profit: i128,
}

/// Gas for one settlement transaction, priced in borrowed-asset units and rounded up.
pub fn gas_cost_units(gas_limit: u64, gas_price_wei: u128, native_price_units: u128) -> u128 {
    let wei = (gas_limit as u128).saturating_mul(gas_price_wei);
    mul_div_ceil(wei, native_price_units, WEI_PER_NATIVE)
}

pub fn flash_loan_fee(principal: u128, premium_bps: u32) -> u128 {
    bps_of_ceil(principal, premium_bps)
}

/// Proceeds lost to price impact when `notional` is sold and bought back through two
/// constant-product pools, each `depth` deep. Settlement sees at least this much depth on
/// both legs, so its actual loss is never larger.
pub fn round_trip_impact(notional: u128, gross_profit: u128, depth: u128) -> u128 {
    let ideal = notional.saturating_add(gross_profit);
    let after_first = constant_product_out(ideal, depth, notional);
    let after_second = constant_product_out(after_first, depth, after_first);
    ideal.saturating_sub(after_second)
}

/// The larger of the base allowance and the round-trip impact at the thinner venue's depth.
pub fn slippage_allowance(
    notional: u128,
    gross_profit: u128,
    thinner_liquidity: u128,
    settings: &ExecutionSettings,
) -> u128 {
    let base = bps_of_ceil(notional, settings.base_slippage_bps);
    base.max(round_trip_impact(notional, gross_profit, thinner_liquidity))
}

pub fn estimate_profit(
    notional: u128,
    spread_bps: u32,
    thinner_liquidity: u128,
    gas_cost: u128,
    settings: &ExecutionSettings,
) -> ProfitEstimate {
    let gross_profit = bps_of(notional, spread_bps);
    let flash_loan_fee = flash_loan_fee(notional, settings.flash_loan_premium_bps);
    let slippage_allowance = slippage_allowance(notional, gross_profit, thinner_liquidity, settings);
    let costs = gas_cost.saturating_add(flash_loan_fee).saturating_add(slippage_allowance);

    ProfitEstimate {
        gross_profit,
        gas_cost,
        flash_loan_fee,
        slippage_allowance,
        net_profit: signed(gross_profit) - signed(costs),
    }
}
