//! Per-entry poll interval with geometric back-off on venue failures

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl PollBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
            failures: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.current
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current
    }

    pub fn on_success(&mut self) {
        self.failures = 0;
        self.current = self.base;
    }
}
