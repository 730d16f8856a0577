//! Health monitoring utilities

use std::time::Instant;
use crate::{errors::BreakerSnapshot, types::HealthStatus};

pub struct HealthInputs<'a> {
    pub watch_entries_running: usize,
    pub watch_entries_paused: usize,
    pub breaker: &'a BreakerSnapshot,
    pub trades_in_flight: usize,
    pub config_version: u64,
    pub last_observation: Option<Instant>,
    pub start_time: Instant,
}

pub fn run_health_check(inputs: HealthInputs<'_>) -> HealthStatus {
    HealthStatus {
        watch_entries_running: inputs.watch_entries_running,
        watch_entries_paused: inputs.watch_entries_paused,
        circuit_breaker_open: inputs.breaker.is_open,
        consecutive_failures: inputs.breaker.consecutive_failures,
        trades_in_flight: inputs.trades_in_flight,
        config_version: inputs.config_version,
        last_observation_age_secs: inputs.last_observation.map(|t| t.elapsed().as_secs()),
        uptime_seconds: inputs.start_time.elapsed().as_secs(),
    }
}
