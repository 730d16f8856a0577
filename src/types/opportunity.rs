//! Spread observations, evaluated opportunities and their event stream

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use super::{PairKey, PriceQuote, RejectionReason, VenueId, WatchId};

/// Raw price gap between two venues for one watch entry.
///
/// `first_leg` is the venue paying the most `token_b` per `token_a` (borrowed asset is
/// sold there), `second_leg` is where `token_b` is bought back.
#[derive(Debug, Clone, Serialize)]
pub struct SpreadObservation {
    pub watch_id: WatchId,
    pub pair: PairKey,
    pub first_leg: PriceQuote,
    pub second_leg: PriceQuote,
    pub spread_bps: u32,
    pub notional: u128,
    pub observed_at: DateTime<Utc>,
}

impl SpreadObservation {
    /// Thinner of the two venues, in borrowed-asset units.
    pub fn thinner_liquidity(&self) -> u128 {
        self.first_leg
            .available_liquidity
            .min(self.second_leg.available_liquidity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    pub id: Uuid,
    pub watch_id: WatchId,
    pub pair: PairKey,
    pub source_venue: VenueId,
    pub target_venue: VenueId,
    pub spread_bps: u32,
    pub gross_notional: u128,
    pub gross_profit: u128,
    pub estimated_gas_cost: u128,
    pub estimated_flash_loan_fee: u128,
    pub slippage_allowance: u128,
    pub estimated_net_profit: i128,
    pub confidence: Decimal,
    pub risk_score_bps: u32,
    pub created_at: DateTime<Utc>,
    pub observation: SpreadObservation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self { reason, detail: detail.into() }
    }
}

#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Accepted(ArbitrageOpportunity),
    Rejected(Rejection),
}

impl EvaluationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EvaluationOutcome::Accepted(_))
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            EvaluationOutcome::Rejected(r) => Some(r.reason),
            EvaluationOutcome::Accepted(_) => None,
        }
    }
}

/// Published for dashboards and the opportunity recorder.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum OpportunityEvent {
    Accepted {
        opportunity: ArbitrageOpportunity,
    },
    Rejected {
        watch_id: WatchId,
        pair: PairKey,
        spread_bps: u32,
        reason: RejectionReason,
        detail: String,
        at: DateTime<Utc>,
    },
}

impl OpportunityEvent {
    pub fn rejected(observation: &SpreadObservation, rejection: Rejection) -> Self {
        OpportunityEvent::Rejected {
            watch_id: observation.watch_id.clone(),
            pair: observation.pair.clone(),
            spread_bps: observation.spread_bps,
            reason: rejection.reason,
            detail: rejection.detail,
            at: Utc::now(),
        }
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            OpportunityEvent::Rejected { reason, .. } => Some(*reason),
            OpportunityEvent::Accepted { .. } => None,
        }
    }
}
