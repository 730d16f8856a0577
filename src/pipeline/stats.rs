//! Session counters

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::types::{RejectionReason, TradeOutcome, TradeState};

#[derive(Debug, Default)]
pub struct PipelineStats {
    observations: AtomicU64,
    dropped: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    rejections: DashMap<RejectionReason, u64>,
    trades_finished: AtomicU64,
    settled: AtomicU64,
    aborted: AtomicU64,
    reverted: AtomicU64,
    rejected_at_execution: AtomicU64,
    realized_profit: Mutex<i128>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub observations: u64,
    pub dropped: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub rejections_by_reason: BTreeMap<String, u64>,
    pub trades_finished: u64,
    pub settled: u64,
    pub aborted: u64,
    pub reverted: u64,
    pub rejected_at_execution: u64,
    pub realized_profit: i128,
}

impl PipelineStats {
    pub fn record_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    /// An observation that never reached evaluation because its network's queue was full.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, reason: RejectionReason) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    pub fn record_outcome(&self, outcome: &TradeOutcome) {
        self.trades_finished.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome.status {
            TradeState::Settled => &self.settled,
            TradeState::Aborted => &self.aborted,
            TradeState::Reverted => &self.reverted,
            _ => &self.rejected_at_execution,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(profit) = outcome.realized_profit {
            *self.realized_profit.lock() += profit;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            observations: self.observations.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            rejections_by_reason: self
                .rejections
                .iter()
                .map(|e| (e.key().code().to_string(), *e.value()))
                .collect(),
            trades_finished: self.trades_finished.load(Ordering::Relaxed),
            settled: self.settled.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            reverted: self.reverted.load(Ordering::Relaxed),
            rejected_at_execution: self.rejected_at_execution.load(Ordering::Relaxed),
            realized_profit: *self.realized_profit.lock(),
        }
    }
}
