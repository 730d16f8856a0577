//! Health monitoring types

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub watch_entries_running: usize,
    pub watch_entries_paused: usize,
    pub circuit_breaker_open: bool,
    pub consecutive_failures: u32,
    pub trades_in_flight: usize,
    pub config_version: u64,
    pub last_observation_age_secs: Option<u64>,
    pub uptime_seconds: u64,
}
