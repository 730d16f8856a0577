//! Token bucket and long-window counter with lazy, clock-driven refill

use std::time::{Duration, Instant};

/// Tokens are tracked in millionths so partial refills accumulate exactly.
const MICROS_PER_TOKEN: u128 = 1_000_000;

/// Capacity-limited bucket. Tokens are replenished from elapsed time whenever the
/// bucket is touched; nothing runs in the background.
#[derive(Debug, Clone)]
pub struct RateBucket {
    pub capacity: u32,
    pub refill_rate_per_second: u32,
    micro_tokens: u128,
    last_refill_at: Instant,
}

impl RateBucket {
    pub fn new(capacity: u32, refill_rate_per_second: u32, now: Instant) -> Self {
        Self {
            capacity,
            refill_rate_per_second,
            micro_tokens: capacity as u128 * MICROS_PER_TOKEN,
            last_refill_at: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill_at);
        if elapsed.is_zero() {
            return;
        }
        // nanos * rate * 1e6 / 1e9
        let added = elapsed.as_nanos() * self.refill_rate_per_second as u128 / 1_000;
        let cap = self.capacity as u128 * MICROS_PER_TOKEN;
        self.micro_tokens = self.micro_tokens.saturating_add(added).min(cap);
        self.last_refill_at = now;
    }

    /// Whole tokens available at `now`.
    pub fn available(&mut self, now: Instant) -> u32 {
        self.refill(now);
        (self.micro_tokens / MICROS_PER_TOKEN) as u32
    }

    pub fn try_consume(&mut self, n: u32, now: Instant) -> bool {
        if self.available(now) < n {
            return false;
        }
        self.micro_tokens -= n as u128 * MICROS_PER_TOKEN;
        true
    }
}

/// Fixed long window (e.g. 15 minutes) counting write-type operations.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    pub limit: u32,
    pub window: Duration,
    count: u32,
    window_started_at: Instant,
}

impl WindowCounter {
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            limit,
            window,
            count: 0,
            window_started_at: now,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_started_at) >= self.window {
            self.count = 0;
            self.window_started_at = now;
        }
    }

    pub fn has_room(&mut self, n: u32, now: Instant) -> bool {
        self.roll(now);
        self.count.saturating_add(n) <= self.limit
    }

    pub fn record(&mut self, n: u32, now: Instant) {
        self.roll(now);
        self.count = self.count.saturating_add(n);
    }

    pub fn used(&self) -> u32 {
        self.count
    }
}
