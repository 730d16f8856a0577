//! Flash-loan settlement semantics and the in-memory dry run
//!
//! The gateway models the steps the settlement contract performs inside one
//! transaction. Any error from `swap` or `repay` means the whole transaction reverts.

use alloy::primitives::Address;
use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use crate::{
    errors::{BotError, BotResult},
    types::{FlashLoanObligation, PriceQuote},
    utils::{bps_of_ceil, constant_product_out, decimal_to_units, units_to_decimal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanReceipt {
    pub asset: Address,
    pub principal: u128,
    pub premium: u128,
}

/// `Forward` sells `token_in` for `token_out` at the quote; `Reverse` buys `token_in`
/// back with `token_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    Forward,
    Reverse,
}

#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Confirms the loan funds are available to the executor.
    async fn draw(&self, asset: Address, principal: u128) -> BotResult<LoanReceipt>;

    /// Output amount of one swap leg.
    async fn swap(&self, leg: &PriceQuote, direction: SwapDirection, amount_in: u128) -> BotResult<u128>;

    /// Confirms repayment out of `available`.
    async fn repay(&self, obligation: &FlashLoanObligation, available: u128) -> BotResult<()>;
}

pub struct DryRunSettlement {
    premium_bps: u32,
    lender_cap: u128,
}

impl DryRunSettlement {
    pub fn new(premium_bps: u32, lender_cap: u128) -> Self {
        Self { premium_bps, lender_cap }
    }

    fn revert(contract: Address, message: String) -> BotError {
        BotError::Contract {
            contract,
            message: message.clone(),
            source: anyhow!(message),
        }
    }
}

#[async_trait]
impl SettlementGateway for DryRunSettlement {
    async fn draw(&self, asset: Address, principal: u128) -> BotResult<LoanReceipt> {
        if self.lender_cap > 0 && principal > self.lender_cap {
            return Err(Self::revert(
                asset,
                format!("principal {} above lender cap {}", principal, self.lender_cap),
            ));
        }
        Ok(LoanReceipt {
            asset,
            principal,
            premium: bps_of_ceil(principal, self.premium_bps),
        })
    }

    async fn swap(&self, leg: &PriceQuote, direction: SwapDirection, amount_in: u128) -> BotResult<u128> {
        if leg.price <= Decimal::ZERO {
            return Err(Self::revert(leg.venue_address, format!("{} has no price", leg.venue)));
        }
        let amount = units_to_decimal(amount_in);
        let depth = leg.available_liquidity;

        let out = match direction {
            SwapDirection::Forward => {
                let ideal = amount
                    .checked_mul(leg.price)
                    .ok_or_else(|| Self::revert(leg.venue_address, "swap amount overflow".to_string()))?;
                constant_product_out(decimal_to_units(ideal), depth, amount_in)
            }
            SwapDirection::Reverse => {
                let ideal = decimal_to_units(
                    amount
                        .checked_div(leg.price)
                        .ok_or_else(|| Self::revert(leg.venue_address, "swap amount overflow".to_string()))?,
                );
                constant_product_out(ideal, depth, ideal)
            }
        };

        if out == 0 {
            return Err(Self::revert(leg.venue_address, format!("{} swap returned nothing", leg.venue)));
        }
        Ok(out)
    }

    async fn repay(&self, obligation: &FlashLoanObligation, available: u128) -> BotResult<()> {
        if available < obligation.total_owed() {
            return Err(Self::revert(
                obligation.asset,
                format!("repayment shortfall: have {}, owe {}", available, obligation.total_owed()),
            ));
        }
        Ok(())
    }
}
