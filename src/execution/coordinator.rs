//! Execution coordinator
//!
//! Drives one trade through borrow, both swaps and repayment against the settlement
//! gateway, then hands the signed settlement transaction to the network's relay client.
//! The dry run runs first so a revert is caught before anything is submitted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info, warn};
use crate::{
    arbitrage::{estimate_profit, gas_cost_units},
    config::ConfigHandle,
    errors::CircuitBreaker,
    network::ChainStateSource,
    relay::PrivateRelayClient,
    types::{
        ArbitrageOpportunity, FailureReason, FlashLoanObligation, InclusionStatus, NetworkId, Rejection,
        RejectionReason, Trade, TradeFailure, TradeOutcome, TradeState,
    },
    utils::{bps_of, signed},
};
use super::{
    FlashArbitrageRoute, InFlightClaim, InFlightRegistry, SettlementGateway, SwapDirection, TradeBundlePlan,
    TransactionSigner,
};

/// Chain access and relay submission for one network.
#[derive(Clone)]
pub struct NetworkExecution {
    pub chain: Arc<dyn ChainStateSource>,
    pub relay: Arc<PrivateRelayClient>,
}

/// A trade that holds its pair's in-flight slot.
pub struct TradeTicket {
    trade: Trade,
    claim: InFlightClaim,
}

impl TradeTicket {
    pub fn trade(&self) -> &Trade {
        &self.trade
    }
}

struct Progress {
    trade: Trade,
    bundle_hash: Option<alloy::primitives::B256>,
    submission_attempts: u32,
    realized_profit: Option<i128>,
}

impl Progress {
    fn advance(&mut self, next: TradeState) {
        if let Err(e) = self.trade.advance(next) {
            error!(trade_id = %self.trade.id, "{}", e);
        }
    }
}

pub struct ExecutionCoordinator {
    config: ConfigHandle,
    breaker: Arc<CircuitBreaker>,
    inflight: Arc<InFlightRegistry>,
    settlement: Arc<dyn SettlementGateway>,
    signer: Arc<dyn TransactionSigner>,
    networks: HashMap<NetworkId, NetworkExecution>,
    outcomes: broadcast::Sender<TradeOutcome>,
}

impl ExecutionCoordinator {
    pub fn new(
        config: ConfigHandle,
        breaker: Arc<CircuitBreaker>,
        inflight: Arc<InFlightRegistry>,
        settlement: Arc<dyn SettlementGateway>,
        signer: Arc<dyn TransactionSigner>,
        networks: HashMap<NetworkId, NetworkExecution>,
        outcomes: broadcast::Sender<TradeOutcome>,
    ) -> Self {
        Self {
            config,
            breaker,
            inflight,
            settlement,
            signer,
            networks,
            outcomes,
        }
    }

    pub fn inflight(&self) -> &Arc<InFlightRegistry> {
        &self.inflight
    }

    /// Claims the opportunity's pair. A second opportunity for a pair already in flight
    /// is dropped here and never becomes a trade.
    pub fn begin(&self, opportunity: ArbitrageOpportunity) -> Result<TradeTicket, Rejection> {
        let max_exposure = self.config.snapshot().config.risk.max_inflight_notional;
        let trade = Trade::new(opportunity);
        let claim = self
            .inflight
            .claim(&trade.opportunity.pair, trade.id, trade.opportunity.gross_notional, max_exposure)
            .map_err(|reason| {
                let detail = match reason {
                    RejectionReason::DuplicateInFlight => format!("{} already has a trade in flight", trade.opportunity.pair),
                    _ => format!("in-flight exposure would exceed {}", max_exposure),
                };
                Rejection::new(reason, detail)
            })?;
        Ok(TradeTicket { trade, claim })
    }

    /// Runs the trade to a terminal state, releases the pair, feeds the breaker and
    /// publishes the outcome.
    pub async fn run(&self, ticket: TradeTicket) -> TradeOutcome {
        let TradeTicket { trade, claim } = ticket;
        let mut progress = Progress {
            trade,
            bundle_hash: None,
            submission_attempts: 0,
            realized_profit: None,
        };
        info!(
            trade_id = %progress.trade.id,
            pair = %progress.trade.opportunity.pair,
            expected = progress.trade.opportunity.estimated_net_profit,
            "🚀 Executing trade"
        );

        let failure = self.drive(&mut progress).await;
        drop(claim);
        self.finish(progress, failure)
    }

    /// Claim and run in one call.
    pub async fn execute(&self, opportunity: ArbitrageOpportunity) -> Result<TradeOutcome, Rejection> {
        let ticket = self.begin(opportunity)?;
        Ok(self.run(ticket).await)
    }

    async fn drive(&self, progress: &mut Progress) -> Option<TradeFailure> {
        let snapshot = self.config.snapshot();
        let config = &snapshot.config;
        let opportunity = progress.trade.opportunity.clone();
        let observation = &opportunity.observation;

        let network_id = &opportunity.pair.network;
        let (Some(execution), Some(network)) = (self.networks.get(network_id), config.network(network_id)) else {
            warn!(trade_id = %progress.trade.id, network = %network_id, "No execution path for network");
            progress.advance(TradeState::Aborted);
            return Some(TradeFailure::Failed(FailureReason::ChainUnavailable));
        };

        // Re-price at current gas before committing to anything
        let (head, fee) = match tokio::try_join!(execution.chain.block_number(), execution.chain.fee_estimate()) {
            Ok(v) => v,
            Err(e) => {
                warn!(trade_id = %progress.trade.id, "⚠️ Chain state unavailable: {}", e);
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::ChainUnavailable));
            }
        };
        let gas_cost = gas_cost_units(network.gas_limit, fee.gas_price(), network.native_price_units);
        let estimate = estimate_profit(
            opportunity.gross_notional,
            opportunity.spread_bps,
            observation.thinner_liquidity(),
            gas_cost,
            &config.execution,
        );
        let min_profit = config
            .watch_entry(&opportunity.watch_id)
            .and_then(|e| e.min_profit)
            .unwrap_or(config.risk.min_profit_units);
        if estimate.net_profit <= 0 || estimate.net_profit < signed(min_profit) {
            info!(
                trade_id = %progress.trade.id,
                net = estimate.net_profit,
                gas_cost,
                "Opportunity unprofitable at execution"
            );
            progress.advance(TradeState::Rejected);
            return Some(TradeFailure::Rejected(RejectionReason::UnprofitableAtExecution));
        }

        let deadline = Instant::now() + Duration::from_secs(config.execution.trade_deadline_secs);
        let asset = observation.first_leg.token_in;
        let intermediate = observation.first_leg.token_out;
        let principal = opportunity.gross_notional;

        // evaluated -> borrowing
        progress.advance(TradeState::Borrowing);
        let draw_timeout = Duration::from_millis(config.execution.loan_draw_timeout_ms);
        let receipt = match tokio::time::timeout(draw_timeout, self.settlement.draw(asset, principal)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                warn!(trade_id = %progress.trade.id, "❌ Loan draw failed: {}", e);
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::LoanDrawFailed));
            }
            Err(_) => {
                warn!(trade_id = %progress.trade.id, "❌ Loan draw timed out after {:?}", draw_timeout);
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::LoanDrawTimeout));
            }
        };
        let obligation = FlashLoanObligation {
            asset,
            principal: receipt.principal,
            premium: receipt.premium,
            must_repay_by: head + u64::from(config.relay.max_blocks_to_try),
        };
        progress.trade.obligation = Some(obligation.clone());

        // borrowing -> swapping, only with the funds confirmed
        progress.advance(TradeState::Swapping);
        let first_leg = tokio::time::timeout_at(
            deadline,
            self.settlement
                .swap(&observation.first_leg, SwapDirection::Forward, receipt.principal),
        );
        let intermediate_out = match first_leg.await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                warn!(trade_id = %progress.trade.id, "❌ First leg reverted: {}", e);
                progress.advance(TradeState::Reverted);
                return Some(TradeFailure::Failed(FailureReason::FirstLegFailed));
            }
            Err(_) => {
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::ExecutionDeadline));
            }
        };
        let second_leg = tokio::time::timeout_at(
            deadline,
            self.settlement
                .swap(&observation.second_leg, SwapDirection::Reverse, intermediate_out),
        );
        let final_out = match second_leg.await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                warn!(trade_id = %progress.trade.id, "❌ Second leg reverted: {}", e);
                progress.advance(TradeState::Reverted);
                return Some(TradeFailure::Failed(FailureReason::InsufficientSecondLegOutput));
            }
            Err(_) => {
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::ExecutionDeadline));
            }
        };

        if final_out < obligation.total_owed() {
            warn!(
                trade_id = %progress.trade.id,
                final_out,
                owed = obligation.total_owed(),
                "❌ Second leg cannot cover the loan, reverting"
            );
            progress.advance(TradeState::Reverted);
            return Some(TradeFailure::Failed(FailureReason::InsufficientSecondLegOutput));
        }

        // swapping -> repaying
        progress.advance(TradeState::Repaying);
        match tokio::time::timeout_at(deadline, self.settlement.repay(&obligation, final_out)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(trade_id = %progress.trade.id, "❌ Repayment failed: {}", e);
                progress.advance(TradeState::Reverted);
                return Some(TradeFailure::Failed(FailureReason::RepaymentShortfall));
            }
            Err(_) => {
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::ExecutionDeadline));
            }
        }

        let nonce = match execution.chain.nonce(self.signer.address()).await {
            Ok(n) => n,
            Err(e) => {
                warn!(trade_id = %progress.trade.id, "⚠️ Nonce unavailable: {}", e);
                progress.advance(TradeState::Aborted);
                return Some(TradeFailure::Failed(FailureReason::ChainUnavailable));
            }
        };

        let keep_bps = 10_000u32.saturating_sub(config.execution.slippage_tolerance_bps);
        let surplus_before_gas = signed(final_out) - signed(obligation.total_owed());
        let plan = TradeBundlePlan {
            route: FlashArbitrageRoute {
                asset,
                principal: obligation.principal,
                intermediate,
                first_venue: observation.first_leg.venue_address,
                second_venue: observation.second_leg.venue_address,
                min_intermediate_out: bps_of(intermediate_out, keep_bps),
                min_final_out: bps_of(final_out, keep_bps).max(obligation.total_owed()),
            },
            executor: network.executor,
            chain_id: network.chain_id,
            gas_limit: network.gas_limit,
            nonce,
            surplus_before_gas,
            native_price_units: network.native_price_units,
            signer: self.signer.clone(),
        };

        let relay_outcome = execution.relay.execute(&plan).await;
        progress.bundle_hash = relay_outcome.hash();
        progress.submission_attempts = relay_outcome.attempts();

        match relay_outcome.status {
            InclusionStatus::Included => {
                let gas_price = relay_outcome
                    .bundle
                    .as_ref()
                    .and_then(|b| b.submission_attempts.last())
                    .map(|a| a.pricing.max_fee_per_gas)
                    .unwrap_or_else(|| fee.gas_price());
                let gas_used = relay_outcome
                    .bundle
                    .as_ref()
                    .and_then(|b| b.simulation_result.as_ref())
                    .map(|s| s.gas_used)
                    .filter(|g| *g > 0)
                    .unwrap_or(network.gas_limit);
                let gas_paid = gas_cost_units(gas_used, gas_price, network.native_price_units);
                progress.realized_profit = Some(surplus_before_gas - signed(gas_paid));
                progress.advance(TradeState::Settled);
                None
            }
            InclusionStatus::Rejected if relay_outcome.failure == Some(FailureReason::SimulationRevert) => {
                progress.advance(TradeState::Reverted);
                Some(TradeFailure::Failed(FailureReason::SimulationRevert))
            }
            _ => {
                progress.advance(TradeState::Aborted);
                Some(TradeFailure::Failed(relay_outcome.failure.unwrap_or(FailureReason::NotIncluded)))
            }
        }
    }

    fn finish(&self, progress: Progress, failure: Option<TradeFailure>) -> TradeOutcome {
        let limits = self.config.snapshot().config.risk.clone();
        let status = progress.trade.state();

        match (status, failure) {
            (TradeState::Settled, _) => {
                self.breaker.record_success(&limits, progress.realized_profit.unwrap_or(0));
            }
            (_, Some(TradeFailure::Failed(reason))) if reason.is_execution_fault() => {
                if self.breaker.record_failure(&limits, 0) {
                    error!(reason = %reason, "🚨 Circuit breaker tripped by execution failures");
                }
            }
            _ => {}
        }

        let outcome = TradeOutcome {
            trade_id: progress.trade.id,
            path: progress.trade.path(),
            opportunity: progress.trade.opportunity,
            status,
            realized_profit: progress.realized_profit,
            failure_reason: failure,
            bundle_hash: progress.bundle_hash,
            submission_attempts: progress.submission_attempts,
            finished_at: chrono::Utc::now(),
        };
        info!(
            trade_id = %outcome.trade_id,
            status = %outcome.status,
            reason = outcome.failure_reason.map(|f| f.code()).unwrap_or("-"),
            "Trade finished"
        );
        // No subscribers is fine
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }
}
