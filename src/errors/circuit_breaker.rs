//! Circuit breaker fed by execution outcomes
//!
//! Two independent trip conditions: a run of consecutive execution failures and the sum
//! of realized losses inside a sliding window. Once open, the breaker stays open for the
//! cool-down and, when manual reset is required, until an explicit reset as well.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use crate::config::RiskLimits;
use crate::utils::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub is_open: bool,
    pub consecutive_failures: u32,
    pub window_loss: u128,
    pub reason: Option<String>,
    pub cooldown_remaining: Duration,
}

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    losses: VecDeque<(Instant, u128)>,
    opened_at: Option<Instant>,
    reason: Option<String>,
    manual_reset_given: bool,
}

pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                losses: VecDeque::new(),
                opened_at: None,
                reason: None,
                manual_reset_given: false,
            }),
            clock,
        }
    }

    pub fn record_success(&self, limits: &RiskLimits, realized_profit: i128) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        if realized_profit < 0 {
            Self::push_loss(&mut state, now, realized_profit.unsigned_abs(), limits);
            Self::check_loss_window(&mut state, now, limits);
        }
    }

    /// Records an execution fault. Returns true when this call tripped the breaker.
    pub fn record_failure(&self, limits: &RiskLimits, loss: u128) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let was_open = state.opened_at.is_some();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if loss > 0 {
            Self::push_loss(&mut state, now, loss, limits);
        }

        if state.opened_at.is_none() && state.consecutive_failures >= limits.max_consecutive_failures {
            let reason = format!("{} consecutive execution failures", state.consecutive_failures);
            Self::open(&mut state, now, reason);
        }
        Self::check_loss_window(&mut state, now, limits);
        !was_open && state.opened_at.is_some()
    }

    /// Ok when new opportunities may be evaluated; otherwise the remaining cool-down.
    pub fn check(&self, limits: &RiskLimits) -> Result<(), BreakerSnapshot> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(opened_at) = state.opened_at else {
            return Ok(());
        };

        let cooldown = Duration::from_secs(limits.cooldown_secs);
        let elapsed = now.saturating_duration_since(opened_at);
        let cooled = elapsed >= cooldown;
        if cooled && (!limits.require_manual_reset || state.manual_reset_given) {
            info!("Circuit breaker cooldown complete, closing");
            Self::close(&mut state);
            return Ok(());
        }

        Err(Self::snapshot_of(&state, now, limits, true))
    }

    pub fn force_trip(&self, reason: impl Into<String>) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let reason = reason.into();
        warn!(reason = %reason, "Circuit breaker force-tripped");
        Self::open(&mut state, now, reason);
    }

    /// Explicit reset. Acknowledges a manual-reset requirement; the breaker still
    /// honours the remaining cool-down before it closes.
    pub fn reset(&self, limits: &RiskLimits) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(opened_at) = state.opened_at else {
            return;
        };
        state.manual_reset_given = true;
        if now.saturating_duration_since(opened_at) >= Duration::from_secs(limits.cooldown_secs) {
            info!("Circuit breaker reset");
            Self::close(&mut state);
        } else {
            info!("Circuit breaker reset acknowledged, waiting for cooldown");
        }
    }

    pub fn snapshot(&self, limits: &RiskLimits) -> BreakerSnapshot {
        let now = self.clock.now();
        let state = self.state.lock();
        let open = state.opened_at.is_some();
        Self::snapshot_of(&state, now, limits, open)
    }

    fn snapshot_of(state: &BreakerState, now: Instant, limits: &RiskLimits, is_open: bool) -> BreakerSnapshot {
        let cooldown_remaining = state
            .opened_at
            .map(|t| Duration::from_secs(limits.cooldown_secs).saturating_sub(now.saturating_duration_since(t)))
            .unwrap_or(Duration::ZERO);
        BreakerSnapshot {
            is_open,
            consecutive_failures: state.consecutive_failures,
            window_loss: state.losses.iter().map(|(_, l)| *l).sum(),
            reason: state.reason.clone(),
            cooldown_remaining,
        }
    }

    fn push_loss(state: &mut BreakerState, now: Instant, loss: u128, limits: &RiskLimits) {
        state.losses.push_back((now, loss));
        let window = Duration::from_secs(limits.loss_window_secs);
        while let Some((at, _)) = state.losses.front() {
            if now.saturating_duration_since(*at) > window {
                state.losses.pop_front();
            } else {
                break;
            }
        }
    }

    fn check_loss_window(state: &mut BreakerState, now: Instant, limits: &RiskLimits) {
        if state.opened_at.is_some() || limits.max_window_loss == 0 {
            return;
        }
        let total: u128 = state.losses.iter().map(|(_, l)| *l).sum();
        if total >= limits.max_window_loss {
            Self::open(state, now, format!("window loss {} reached limit {}", total, limits.max_window_loss));
        }
    }

    fn open(state: &mut BreakerState, now: Instant, reason: String) {
        error!(reason = %reason, "Circuit breaker OPEN");
        state.opened_at = Some(now);
        state.reason = Some(reason);
        state.manual_reset_given = false;
    }

    fn close(state: &mut BreakerState) {
        state.opened_at = None;
        state.reason = None;
        state.consecutive_failures = 0;
        state.losses.clear();
        state.manual_reset_given = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn limits() -> RiskLimits {
        RiskLimits {
            max_consecutive_failures: 3,
            cooldown_secs: 60,
            loss_window_secs: 300,
            max_window_loss: 1_000,
            require_manual_reset: false,
            ..RiskLimits::default()
        }
    }

    #[test]
    fn trips_after_consecutive_failures_and_closes_after_cooldown() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(Arc::new(clock.clone()));
        let limits = limits();

        assert!(!breaker.record_failure(&limits, 0));
        assert!(!breaker.record_failure(&limits, 0));
        assert!(breaker.record_failure(&limits, 0));
        assert!(breaker.check(&limits).is_err());

        clock.advance(Duration::from_secs(59));
        assert!(breaker.check(&limits).is_err());
        clock.advance(Duration::from_secs(1));
        assert!(breaker.check(&limits).is_ok());
        assert_eq!(breaker.snapshot(&limits).consecutive_failures, 0);
    }

    #[test]
    fn success_resets_the_failure_run() {
        let breaker = CircuitBreaker::new(Arc::new(ManualClock::new()));
        let limits = limits();
        breaker.record_failure(&limits, 0);
        breaker.record_failure(&limits, 0);
        breaker.record_success(&limits, 10);
        assert!(!breaker.record_failure(&limits, 0));
        assert!(breaker.check(&limits).is_ok());
    }

    #[test]
    fn window_losses_trip_independently() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(Arc::new(clock.clone()));
        let limits = limits();
        breaker.record_success(&limits, -600);
        assert!(breaker.check(&limits).is_ok());
        breaker.record_success(&limits, -400);
        let snapshot = breaker.check(&limits).unwrap_err();
        assert!(snapshot.reason.unwrap().contains("window loss"));
    }

    #[test]
    fn losses_outside_the_window_expire() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(Arc::new(clock.clone()));
        let limits = limits();
        breaker.record_success(&limits, -900);
        clock.advance(Duration::from_secs(301));
        breaker.record_success(&limits, -200);
        assert!(breaker.check(&limits).is_ok());
    }

    #[test]
    fn manual_reset_requires_both_reset_and_cooldown() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(Arc::new(clock.clone()));
        let limits = RiskLimits { require_manual_reset: true, ..limits() };

        breaker.force_trip("operator");
        breaker.reset(&limits);
        assert!(breaker.check(&limits).is_err(), "reset before cooldown must not close");

        clock.advance(Duration::from_secs(61));
        assert!(breaker.check(&limits).is_ok());

        breaker.force_trip("operator again");
        clock.advance(Duration::from_secs(61));
        assert!(breaker.check(&limits).is_err(), "cooldown alone must not close");
        breaker.reset(&limits);
        assert!(breaker.check(&limits).is_ok());
    }
}
