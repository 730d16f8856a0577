//! Trade lifecycle state machine and flash-loan obligations

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;
use crate::errors::{BotError, BotResult};
use super::{ArbitrageOpportunity, FailureReason, RejectionReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradeState {
    Evaluated,
    Borrowing,
    Swapping,
    Repaying,
    Settled,
    Rejected,
    Aborted,
    Reverted,
}

impl TradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Settled | TradeState::Rejected | TradeState::Aborted | TradeState::Reverted
        )
    }

    pub fn can_transition_to(&self, next: TradeState) -> bool {
        use TradeState::*;
        matches!(
            (self, next),
            (Evaluated, Borrowing)
                | (Evaluated, Rejected)
                | (Evaluated, Aborted)
                | (Borrowing, Swapping)
                | (Borrowing, Aborted)
                | (Swapping, Repaying)
                | (Swapping, Reverted)
                | (Swapping, Aborted)
                | (Repaying, Settled)
                | (Repaying, Reverted)
                | (Repaying, Aborted)
        )
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeState::Evaluated => "evaluated",
            TradeState::Borrowing => "borrowing",
            TradeState::Swapping => "swapping",
            TradeState::Repaying => "repaying",
            TradeState::Settled => "settled",
            TradeState::Rejected => "rejected",
            TradeState::Aborted => "aborted",
            TradeState::Reverted => "reverted",
        };
        f.write_str(s)
    }
}

/// Borrow owed back inside the same transaction. There is no partially repaid state:
/// either the enclosing transaction repays `principal + premium` or it never happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashLoanObligation {
    pub asset: Address,
    pub principal: u128,
    pub premium: u128,
    pub must_repay_by: u64,
}

impl FlashLoanObligation {
    pub fn total_owed(&self) -> u128 {
        self.principal.saturating_add(self.premium)
    }
}

/// One execution attempt for an accepted opportunity. Only the coordinator mutates it.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: Uuid,
    pub opportunity: ArbitrageOpportunity,
    state: TradeState,
    history: Vec<(TradeState, DateTime<Utc>)>,
    pub obligation: Option<FlashLoanObligation>,
}

impl Trade {
    pub fn new(opportunity: ArbitrageOpportunity) -> Self {
        Self {
            id: Uuid::new_v4(),
            opportunity,
            state: TradeState::Evaluated,
            history: vec![(TradeState::Evaluated, Utc::now())],
            obligation: None,
        }
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn path(&self) -> Vec<TradeState> {
        self.history.iter().map(|(s, _)| *s).collect()
    }

    pub fn advance(&mut self, next: TradeState) -> BotResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(BotError::InvalidTransition {
                trade_id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push((next, Utc::now()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TradeFailure {
    Rejected(RejectionReason),
    Failed(FailureReason),
}

impl TradeFailure {
    pub fn code(&self) -> &'static str {
        match self {
            TradeFailure::Rejected(r) => r.code(),
            TradeFailure::Failed(f) => f.code(),
        }
    }
}

/// Terminal record handed to persistence and alerting.
#[derive(Debug, Clone, Serialize)]
pub struct TradeOutcome {
    pub trade_id: Uuid,
    pub opportunity: ArbitrageOpportunity,
    pub status: TradeState,
    pub path: Vec<TradeState>,
    pub realized_profit: Option<i128>,
    pub failure_reason: Option<TradeFailure>,
    pub bundle_hash: Option<B256>,
    pub submission_attempts: u32,
    pub finished_at: DateTime<Utc>,
}

impl TradeOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TradeState::Settled
    }
}
