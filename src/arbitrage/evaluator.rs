//! Profitability evaluator and risk gate
//!
//! Checks run in a fixed order so a rejection always names the first gate that failed:
//! circuit breaker, quote freshness, liquidity fraction, net profit, minimum profit,
//! minimum return, volatility. Every accept/reject comparison is on integers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use crate::{
    config::ConfigHandle,
    errors::CircuitBreaker,
    types::{ArbitrageOpportunity, EvaluationOutcome, Rejection, RejectionReason, SpreadObservation},
    utils::{ratio_bps, return_bps, signed},
    validation::check_liquidity_fraction,
    volatility::VolatilityTracker,
};
use super::{estimate_profit, gas_cost_units, ConfidenceModel, NEUTRAL_CONFIDENCE};

/// Fee conditions at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub gas_price_wei: u128,
}

pub struct ProfitabilityEvaluator {
    config: ConfigHandle,
    breaker: Arc<CircuitBreaker>,
    volatility: Arc<VolatilityTracker>,
    confidence: Arc<dyn ConfidenceModel>,
}

impl ProfitabilityEvaluator {
    pub fn new(
        config: ConfigHandle,
        breaker: Arc<CircuitBreaker>,
        volatility: Arc<VolatilityTracker>,
        confidence: Arc<dyn ConfidenceModel>,
    ) -> Self {
        Self {
            config,
            breaker,
            volatility,
            confidence,
        }
    }

    pub async fn evaluate(&self, observation: &SpreadObservation, context: &EvaluationContext) -> EvaluationOutcome {
        match self.assess(observation, context, Utc::now()) {
            Ok(mut opportunity) => {
                opportunity.confidence = self.confidence.score(&opportunity).await;
                EvaluationOutcome::Accepted(opportunity)
            }
            Err(rejection) => {
                debug!(
                    watch_id = %observation.watch_id,
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "Opportunity rejected"
                );
                EvaluationOutcome::Rejected(rejection)
            }
        }
    }

    /// Synchronous part of the evaluation; the returned opportunity carries a neutral score.
    pub fn assess(
        &self,
        observation: &SpreadObservation,
        context: &EvaluationContext,
        now: DateTime<Utc>,
    ) -> Result<ArbitrageOpportunity, Rejection> {
        let snapshot = self.config.snapshot();
        let config = &snapshot.config;
        let risk = &config.risk;

        if let Err(state) = self.breaker.check(risk) {
            return Err(Rejection::new(
                RejectionReason::CircuitOpen,
                format!(
                    "{} ({}s cooldown left)",
                    state.reason.unwrap_or_default(),
                    state.cooldown_remaining.as_secs()
                ),
            ));
        }

        let max_age = ChronoDuration::seconds(config.scanner.max_quote_age_secs);
        for leg in [&observation.first_leg, &observation.second_leg] {
            if !leg.is_fresh(now, max_age) {
                return Err(Rejection::new(
                    RejectionReason::StaleQuote,
                    format!("{} quote is {}s old", leg.venue, leg.age(now).num_seconds()),
                ));
            }
        }

        let mid = (observation.first_leg.price + observation.second_leg.price) / Decimal::TWO;
        let volatility_bps = self.volatility.observe(
            &observation.pair,
            mid,
            Duration::from_secs(risk.volatility_window_secs),
        );

        let notional = observation.notional;
        let thinner = observation.thinner_liquidity();
        if let Err(utilization) = check_liquidity_fraction(notional, thinner, risk.max_trade_fraction_bps) {
            return Err(Rejection::new(
                RejectionReason::ExceedsLiquidityFraction,
                format!(
                    "notional {} is {} bps of thinner liquidity {} (max {} bps)",
                    notional, utilization, thinner, risk.max_trade_fraction_bps
                ),
            ));
        }

        let network = config.network(&observation.pair.network).ok_or_else(|| {
            Rejection::new(RejectionReason::StaleQuote, format!("network {} no longer configured", observation.pair.network))
        })?;
        let gas_cost = gas_cost_units(network.gas_limit, context.gas_price_wei, network.native_price_units);
        let estimate = estimate_profit(notional, observation.spread_bps, thinner, gas_cost, &config.execution);

        if estimate.net_profit <= 0 {
            return Err(Rejection::new(
                RejectionReason::NonPositiveProfit,
                format!("net {} after gas {}, fee {}, slippage {}", estimate.net_profit, estimate.gas_cost, estimate.flash_loan_fee, estimate.slippage_allowance),
            ));
        }

        let min_profit = config
            .watch_entry(&observation.watch_id)
            .and_then(|e| e.min_profit)
            .unwrap_or(risk.min_profit_units);
        if estimate.net_profit < signed(min_profit) {
            return Err(Rejection::new(
                RejectionReason::BelowMinProfit,
                format!("net {} below minimum {}", estimate.net_profit, min_profit),
            ));
        }

        let return_on_notional = return_bps(estimate.net_profit, notional);
        if return_on_notional < risk.min_return_bps as i128 {
            return Err(Rejection::new(
                RejectionReason::BelowMinReturn,
                format!("return {} bps below minimum {} bps", return_on_notional, risk.min_return_bps),
            ));
        }

        if volatility_bps > risk.max_volatility_bps {
            return Err(Rejection::new(
                RejectionReason::VolatilityGate,
                format!("volatility {} bps above {} bps", volatility_bps, risk.max_volatility_bps),
            ));
        }

        let utilization_bps = u32::try_from(ratio_bps(notional, thinner)).unwrap_or(u32::MAX);

        Ok(ArbitrageOpportunity {
            id: Uuid::new_v4(),
            watch_id: observation.watch_id.clone(),
            pair: observation.pair.clone(),
            source_venue: observation.first_leg.venue.clone(),
            target_venue: observation.second_leg.venue.clone(),
            spread_bps: observation.spread_bps,
            gross_notional: notional,
            gross_profit: estimate.gross_profit,
            estimated_gas_cost: estimate.gas_cost,
            estimated_flash_loan_fee: estimate.flash_loan_fee,
            slippage_allowance: estimate.slippage_allowance,
            estimated_net_profit: estimate.net_profit,
            confidence: NEUTRAL_CONFIDENCE,
            risk_score_bps: utilization_bps.max(volatility_bps),
            created_at: now,
            observation: observation.clone(),
        })
    }
}
