//! Administrative control surface
//!
//! Every mutating call is a write operation for the admission controller under the
//! caller's identity. Trusted callers bypass and land in the bypass audit.

use std::sync::Arc;
use tracing::{info, warn};
use crate::{
    admission::{AdmissionController, AdmissionKey, OperationKind},
    config::{ConfigHandle, RiskLimits, WatchEntry},
    errors::{BotError, BotResult, BreakerSnapshot, CircuitBreaker},
    scanner::Scanner,
    types::WatchId,
};

pub const ADMIN_ENDPOINT: &str = "admin";

pub struct AdminControl {
    scanner: Arc<Scanner>,
    breaker: Arc<CircuitBreaker>,
    config: ConfigHandle,
    admission: Arc<AdmissionController>,
}

impl AdminControl {
    pub fn new(
        scanner: Arc<Scanner>,
        breaker: Arc<CircuitBreaker>,
        config: ConfigHandle,
        admission: Arc<AdmissionController>,
    ) -> Self {
        Self {
            scanner,
            breaker,
            config,
            admission,
        }
    }

    fn authorize(&self, caller: &str, kind: OperationKind) -> BotResult<()> {
        let key = AdmissionKey::new(ADMIN_ENDPOINT, caller);
        self.admission.admit(&key, kind).map(|_| ()).inspect_err(|e| {
            warn!(caller, "Admin call refused: {}", e);
        })
    }

    fn unknown(id: &WatchId) -> BotError {
        BotError::MalformedWatchEntry {
            id: id.to_string(),
            reason: "no such watch entry".to_string(),
        }
    }

    pub fn pause(&self, caller: &str, id: &WatchId) -> BotResult<()> {
        self.authorize(caller, OperationKind::Write)?;
        if !self.scanner.pause(id) {
            return Err(Self::unknown(id));
        }
        info!(caller, watch_id = %id, "⏸️ Watch entry paused");
        Ok(())
    }

    pub fn resume(&self, caller: &str, id: &WatchId) -> BotResult<()> {
        self.authorize(caller, OperationKind::Write)?;
        if !self.scanner.resume(id) {
            return Err(Self::unknown(id));
        }
        info!(caller, watch_id = %id, "▶️ Watch entry resumed");
        Ok(())
    }

    pub fn add_watch_entry(&self, caller: &str, entry: WatchEntry) -> BotResult<u64> {
        self.authorize(caller, OperationKind::Write)?;
        if self.config.snapshot().config.watch_entry(&entry.id).is_some() {
            return Err(BotError::MalformedWatchEntry {
                id: entry.id.to_string(),
                reason: "duplicate id".to_string(),
            });
        }
        self.scanner.add(entry.clone())?;
        let id = entry.id.clone();
        let version = self.config.update(|c| c.watch.push(entry.clone()));
        info!(caller, watch_id = %id, version, "➕ Watch entry added");
        Ok(version)
    }

    pub fn remove_watch_entry(&self, caller: &str, id: &WatchId) -> BotResult<u64> {
        self.authorize(caller, OperationKind::Write)?;
        if !self.scanner.remove(id) {
            return Err(Self::unknown(id));
        }
        let version = self.config.update(|c| c.watch.retain(|w| &w.id != id));
        info!(caller, watch_id = %id, version, "➖ Watch entry removed");
        Ok(version)
    }

    pub fn force_trip(&self, caller: &str, reason: &str) -> BotResult<()> {
        self.authorize(caller, OperationKind::Write)?;
        self.breaker.force_trip(format!("forced by {}: {}", caller, reason));
        Ok(())
    }

    pub fn reset_breaker(&self, caller: &str) -> BotResult<BreakerSnapshot> {
        self.authorize(caller, OperationKind::Write)?;
        let limits = self.config.snapshot().config.risk.clone();
        self.breaker.reset(&limits);
        Ok(self.breaker.snapshot(&limits))
    }

    pub fn update_risk_limits(&self, caller: &str, limits: RiskLimits) -> BotResult<u64> {
        self.authorize(caller, OperationKind::Write)?;
        if limits.max_trade_fraction_bps > crate::config::MAX_TRADE_FRACTION_BPS || limits.max_consecutive_failures == 0 {
            return Err(BotError::config("risk limits out of range"));
        }
        let version = self.config.update_risk_limits(limits);
        info!(caller, version, "⚙️ Risk limits adjusted");
        Ok(version)
    }

    pub fn breaker_status(&self, caller: &str) -> BotResult<BreakerSnapshot> {
        self.authorize(caller, OperationKind::Read)?;
        Ok(self.breaker.snapshot(&self.config.snapshot().config.risk))
    }
}
