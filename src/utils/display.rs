//! Display and printing utilities

use std::time::Instant;
use tracing::{error, info, warn};
use crate::{
    errors::BreakerSnapshot,
    pipeline::StatsSnapshot,
    types::{ArbitrageOpportunity, TradeOutcome},
    utils::units_to_decimal,
};

pub fn print_session_stats(start_time: Instant, stats: &StatsSnapshot, breaker: &BreakerSnapshot) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🔎 SCANNING:");
    info!("     Spread observations: {}", stats.observations);
    if stats.dropped > 0 {
        info!("     Dropped (queue full): {}", stats.dropped);
    }
    info!("     Accepted: {}", stats.accepted);
    info!("     Rejected: {}", stats.rejected);
    info!("     Acceptance rate: {:.1}%",
        if stats.observations > 0 {
            (stats.accepted as f64 / stats.observations as f64) * 100.0
        } else {
            0.0
        }
    );
    if !stats.rejections_by_reason.is_empty() {
        info!("     Rejections by reason:");
        for (reason, count) in &stats.rejections_by_reason {
            info!("       {}: {}", reason, count);
        }
    }

    info!("   🚀 TRADE EXECUTION:");
    info!("     Trades finished: {}", stats.trades_finished);
    info!("     Settled: {}", stats.settled);
    info!("     Aborted: {}", stats.aborted);
    info!("     Reverted: {}", stats.reverted);
    info!("     Rejected at execution: {}", stats.rejected_at_execution);
    info!("     Realized profit: {} units", stats.realized_profit);

    info!("   ⚙️  SYSTEM:");
    info!("     Circuit breaker: {}", if breaker.is_open { "OPEN" } else { "CLOSED" });
    if let Some(reason) = &breaker.reason {
        info!("     Breaker reason: {}", reason);
    }
    info!("");
}

pub fn print_arbitrage_opportunity(opportunity: &ArbitrageOpportunity) {
    warn!("\n🎯 ARBITRAGE OPPORTUNITY #{}", opportunity.id);
    warn!("📍 Pair: {} ({})", opportunity.pair, opportunity.watch_id);
    warn!("📋 Route: {} -> {}", opportunity.source_venue, opportunity.target_venue);
    warn!("💰 Profit Analysis:");
    warn!("   Spread: {} bps", opportunity.spread_bps);
    warn!("   Notional: {}", units_to_decimal(opportunity.gross_notional));
    warn!("   Gross: {}", opportunity.gross_profit);
    warn!("   Gas: {}  Flash fee: {}  Slippage: {}",
        opportunity.estimated_gas_cost,
        opportunity.estimated_flash_loan_fee,
        opportunity.slippage_allowance
    );
    warn!("   Net Profit: {}", opportunity.estimated_net_profit);
    warn!("   Confidence: {:.2}  Risk: {} bps", opportunity.confidence, opportunity.risk_score_bps);
}

pub fn print_trade_outcome(outcome: &TradeOutcome) {
    if outcome.is_success() {
        warn!("\n✅ TRADE SETTLED #{}", outcome.trade_id);
        warn!("   Route: {} -> {}", outcome.opportunity.source_venue, outcome.opportunity.target_venue);
        if let Some(hash) = &outcome.bundle_hash {
            warn!("   Bundle: {}", hash);
        }
        warn!("   Expected Profit: {}", outcome.opportunity.estimated_net_profit);
        if let Some(profit) = outcome.realized_profit {
            warn!("   Realized Profit: {}", profit);
        }
        warn!("   Submission attempts: {}", outcome.submission_attempts);
    } else {
        error!("\n❌ TRADE {} #{}", outcome.status.to_string().to_uppercase(), outcome.trade_id);
        error!("   Reason: {}", outcome.failure_reason.map(|r| r.code()).unwrap_or("unknown"));
        error!("   Path: {:?}", outcome.path);
    }
}
