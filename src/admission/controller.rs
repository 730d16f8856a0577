//! Admission controller: per (endpoint, caller) rate buckets with a write window and an
//! audited allow-list bypass
//!
//! `try_consume` never blocks. Each key's state sits behind its own mutex, held only for
//! the in-memory check-and-update.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use crate::config::AdmissionSettings;
use crate::errors::BotError;
use crate::utils::Clock;
use super::{RateBucket, WindowCounter};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AdmissionKey {
    pub endpoint: String,
    pub caller: String,
}

impl AdmissionKey {
    pub fn new(endpoint: impl Into<String>, caller: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            caller: caller.into(),
        }
    }
}

impl fmt::Display for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.caller, self.endpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BurstExhausted,
    WriteWindowExhausted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::BurstExhausted => f.write_str("burst-exhausted"),
            DenyReason::WriteWindowExhausted => f.write_str("write-window-exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Bypassed,
    Denied(DenyReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Denied(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BypassRecord {
    pub caller: String,
    pub endpoint: String,
    pub at: DateTime<Utc>,
}

struct KeyState {
    burst: RateBucket,
    writes: WindowCounter,
}

impl KeyState {
    fn deny_reason(&mut self, n: u32, kind: OperationKind, now: Instant) -> Option<DenyReason> {
        if kind == OperationKind::Write && !self.writes.has_room(n, now) {
            return Some(DenyReason::WriteWindowExhausted);
        }
        if self.burst.available(now) < n {
            return Some(DenyReason::BurstExhausted);
        }
        None
    }

    fn charge(&mut self, n: u32, kind: OperationKind, now: Instant) {
        self.burst.try_consume(n, now);
        if kind == OperationKind::Write {
            self.writes.record(n, now);
        }
    }
}

pub struct AdmissionController {
    settings: AdmissionSettings,
    trusted: HashSet<String>,
    keys: DashMap<AdmissionKey, Arc<Mutex<KeyState>>>,
    audit: Mutex<VecDeque<BypassRecord>>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    pub fn new(settings: AdmissionSettings, clock: Arc<dyn Clock>) -> Self {
        let trusted = settings.trusted_callers.iter().cloned().collect();
        Self {
            settings,
            trusted,
            keys: DashMap::new(),
            audit: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    pub fn try_consume(&self, key: &AdmissionKey, n: u32, kind: OperationKind) -> Admission {
        self.try_consume_all(std::slice::from_ref(key), n, kind)
    }

    /// Charges `n` units to every key or to none. Every gate of every key is checked
    /// before anything is charged; key states are locked in a fixed order.
    pub fn try_consume_all(&self, keys: &[AdmissionKey], n: u32, kind: OperationKind) -> Admission {
        let mut charged: Vec<(&AdmissionKey, u32)> = Vec::with_capacity(keys.len());
        let mut bypassed = false;
        for key in keys {
            if self.trusted.contains(&key.caller) {
                self.audit_bypass(key);
                bypassed = true;
            } else if let Some(existing) = charged.iter_mut().find(|(k, _)| *k == key) {
                existing.1 = existing.1.saturating_add(n);
            } else {
                charged.push((key, n));
            }
        }
        if charged.is_empty() && bypassed {
            return Admission::Bypassed;
        }
        charged.sort_by(|(a, _), (b, _)| (&a.endpoint, &a.caller).cmp(&(&b.endpoint, &b.caller)));

        let now = self.clock.now();
        let states: Vec<_> = charged.iter().map(|(key, _)| self.state_for(key, now)).collect();
        let mut guards: Vec<_> = states.iter().map(|state| state.lock()).collect();

        for ((key, units), state) in charged.iter().zip(guards.iter_mut()) {
            if let Some(reason) = state.deny_reason(*units, kind, now) {
                debug!(key = %key, %reason, "Admission denied");
                return Admission::Denied(reason);
            }
        }
        for ((_, units), state) in charged.iter().zip(guards.iter_mut()) {
            state.charge(*units, kind, now);
        }
        Admission::Admitted
    }

    /// `try_consume` for one unit, mapped to an error for callers that propagate.
    pub fn admit(&self, key: &AdmissionKey, kind: OperationKind) -> Result<Admission, BotError> {
        match self.try_consume(key, 1, kind) {
            Admission::Denied(reason) => Err(BotError::AdmissionDenied {
                endpoint: key.endpoint.clone(),
                caller: key.caller.clone(),
                reason: reason.to_string(),
            }),
            allowed => Ok(allowed),
        }
    }

    pub fn bypass_audit(&self) -> Vec<BypassRecord> {
        self.audit.lock().iter().cloned().collect()
    }

    pub fn is_trusted(&self, caller: &str) -> bool {
        self.trusted.contains(caller)
    }

    fn state_for(&self, key: &AdmissionKey, now: Instant) -> Arc<Mutex<KeyState>> {
        if let Some(existing) = self.keys.get(key) {
            return existing.clone();
        }
        self.keys
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(KeyState {
                    burst: RateBucket::new(self.settings.burst_capacity, self.settings.refill_per_sec, now),
                    writes: WindowCounter::new(
                        self.settings.max_writes_per_window,
                        Duration::from_secs(self.settings.write_window_secs),
                        now,
                    ),
                }))
            })
            .clone()
    }

    fn audit_bypass(&self, key: &AdmissionKey) {
        let record = BypassRecord {
            caller: key.caller.clone(),
            endpoint: key.endpoint.clone(),
            at: Utc::now(),
        };
        info!(caller = %record.caller, endpoint = %record.endpoint, "Trusted caller bypassed admission");
        let mut audit = self.audit.lock();
        if audit.len() >= self.settings.audit_capacity.max(1) {
            audit.pop_front();
        }
        audit.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn controller(clock: &ManualClock, trusted: &[&str]) -> AdmissionController {
        let settings = AdmissionSettings {
            burst_capacity: 5,
            refill_per_sec: 1,
            write_window_secs: 900,
            max_writes_per_window: 2,
            trusted_callers: trusted.iter().map(|s| s.to_string()).collect(),
            audit_capacity: 10,
        };
        AdmissionController::new(settings, Arc::new(clock.clone()))
    }

    #[test]
    fn capacity_five_refill_one_per_second() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &[]);
        let key = AdmissionKey::new("relay", "scanner");

        for _ in 0..5 {
            assert_eq!(admission.try_consume(&key, 1, OperationKind::Read), Admission::Admitted);
        }
        assert_eq!(
            admission.try_consume(&key, 1, OperationKind::Read),
            Admission::Denied(DenyReason::BurstExhausted)
        );

        clock.advance(Duration::from_secs(1));
        assert!(admission.try_consume(&key, 1, OperationKind::Read).is_allowed());
        assert!(!admission.try_consume(&key, 1, OperationKind::Read).is_allowed());
    }

    #[test]
    fn keys_are_independent() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &[]);
        let a = AdmissionKey::new("venue-a", "scanner");
        let b = AdmissionKey::new("venue-b", "scanner");
        for _ in 0..5 {
            admission.try_consume(&a, 1, OperationKind::Read);
        }
        assert!(admission.try_consume(&b, 1, OperationKind::Read).is_allowed());
    }

    #[test]
    fn write_window_gates_writes_without_charging_burst() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &[]);
        let key = AdmissionKey::new("admin", "operator");
        assert!(admission.try_consume(&key, 1, OperationKind::Write).is_allowed());
        assert!(admission.try_consume(&key, 1, OperationKind::Write).is_allowed());
        assert_eq!(
            admission.try_consume(&key, 1, OperationKind::Write),
            Admission::Denied(DenyReason::WriteWindowExhausted)
        );
        // Reads still have the remaining burst tokens
        for _ in 0..3 {
            assert!(admission.try_consume(&key, 1, OperationKind::Read).is_allowed());
        }
    }

    #[test]
    fn multi_key_admission_charges_nothing_when_one_key_is_dry() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &[]);
        let x = AdmissionKey::new("venue-x", "scanner");
        let y = AdmissionKey::new("venue-y", "scanner");
        for _ in 0..5 {
            admission.try_consume(&y, 1, OperationKind::Read);
        }

        let both = [x.clone(), y];
        for _ in 0..3 {
            assert_eq!(
                admission.try_consume_all(&both, 1, OperationKind::Read),
                Admission::Denied(DenyReason::BurstExhausted)
            );
        }
        for _ in 0..5 {
            assert!(admission.try_consume(&x, 1, OperationKind::Read).is_allowed());
        }
        assert!(!admission.try_consume(&x, 1, OperationKind::Read).is_allowed());
    }

    #[test]
    fn repeated_key_is_charged_for_each_use() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &[]);
        let key = AdmissionKey::new("venue-x", "scanner");
        let twice = [key.clone(), key.clone()];
        assert!(admission.try_consume_all(&twice, 2, OperationKind::Read).is_allowed());
        assert!(!admission.try_consume_all(&twice, 1, OperationKind::Read).is_allowed());
        assert!(admission.try_consume(&key, 1, OperationKind::Read).is_allowed());
    }

    #[test]
    fn trusted_callers_bypass_and_are_audited() {
        let clock = ManualClock::new();
        let admission = controller(&clock, &["ops-console"]);
        let key = AdmissionKey::new("admin", "ops-console");
        for _ in 0..20 {
            assert_eq!(admission.try_consume(&key, 1, OperationKind::Write), Admission::Bypassed);
        }
        let audit = admission.bypass_audit();
        assert_eq!(audit.len(), 10);
        assert!(audit.iter().all(|r| r.caller == "ops-console" && r.endpoint == "admin"));
    }
}
