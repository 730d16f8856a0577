//! Engine configuration settings and environment variable handling

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use crate::errors::{BotError, BotResult};
use crate::types::{NetworkId, VenueId, WatchId};
use super::watchlist::{NetworkConfig, VenueConfig, WatchEntry, Watchlist};

// Configuration bounds
pub const MAX_FLASH_LOAN_PREMIUM_BPS: u32 = 100;
pub const MAX_SLIPPAGE_BPS: u32 = 500;
pub const MAX_TRADE_FRACTION_BPS: u32 = 10_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_GAS_LIMIT: u64 = 450_000;

/// Risk thresholds. Adjustable at runtime through the config handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskLimits {
    /// Minimum net profit in raw borrowed-asset units, unless a watch entry overrides it.
    pub min_profit_units: u128,
    pub min_return_bps: u32,
    pub max_trade_fraction_bps: u32,
    pub max_volatility_bps: u32,
    pub volatility_window_secs: u64,
    pub max_consecutive_failures: u32,
    pub loss_window_secs: u64,
    /// Realized loss within the window that trips the breaker. Zero disables the check.
    pub max_window_loss: u128,
    pub cooldown_secs: u64,
    pub require_manual_reset: bool,
    /// Total notional of non-terminal trades. Zero disables the cap.
    pub max_inflight_notional: u128,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_profit_units: 1_000_000,
            min_return_bps: 10,
            max_trade_fraction_bps: 5_000,
            max_volatility_bps: 300,
            volatility_window_secs: 300,
            max_consecutive_failures: 3,
            loss_window_secs: 3_600,
            max_window_loss: 0,
            cooldown_secs: 300,
            require_manual_reset: false,
            max_inflight_notional: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannerSettings {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub quote_timeout_ms: u64,
    pub max_quote_age_secs: i64,
    pub max_block_age: u64,
    pub channel_capacity: usize,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_backoff_ms: 30_000,
            quote_timeout_ms: 2_000,
            max_quote_age_secs: 6,
            max_block_age: 2,
            channel_capacity: 1_024,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSettings {
    pub flash_loan_premium_bps: u32,
    pub base_slippage_bps: u32,
    /// Tolerance applied to dry-run outputs when deriving calldata min-output guards.
    pub slippage_tolerance_bps: u32,
    pub loan_draw_timeout_ms: u64,
    pub trade_deadline_secs: u64,
    /// Largest principal the flash lender will advance. Zero means unlimited.
    pub lender_cap: u128,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            flash_loan_premium_bps: 9,
            base_slippage_bps: 3,
            slippage_tolerance_bps: 30,
            loan_draw_timeout_ms: 3_000,
            trade_deadline_secs: 60,
            lender_cap: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelaySettings {
    pub max_blocks_to_try: u32,
    pub max_transport_retries: u32,
    pub priority_fee_escalation_bps: u32,
    pub max_priority_fee_wei: u128,
    pub min_bundle_value_wei: u128,
    pub block_poll_interval_ms: u64,
    /// Longest wait for an inclusion verdict on one attempt.
    pub inclusion_timeout_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_blocks_to_try: 3,
            max_transport_retries: 3,
            priority_fee_escalation_bps: 2_500,
            max_priority_fee_wei: 20_000_000_000,
            min_bundle_value_wei: 0,
            block_poll_interval_ms: 500,
            inclusion_timeout_ms: 36_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSettings {
    pub burst_capacity: u32,
    pub refill_per_sec: u32,
    pub write_window_secs: u64,
    pub max_writes_per_window: u32,
    pub trusted_callers: Vec<String>,
    pub audit_capacity: usize,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            burst_capacity: 10,
            refill_per_sec: 5,
            write_window_secs: 900,
            max_writes_per_window: 30,
            trusted_callers: Vec::new(),
            audit_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub scanner: ScannerSettings,
    pub risk: RiskLimits,
    pub execution: ExecutionSettings,
    pub relay: RelaySettings,
    pub admission: AdmissionSettings,
    pub private_key: Option<String>,
    pub relay_signing_key: Option<String>,
    pub confidence_endpoint: Option<String>,
    pub networks: BTreeMap<NetworkId, NetworkConfig>,
    pub venues: Vec<VenueConfig>,
    pub watch: Vec<WatchEntry>,
}

impl Config {
    /// Load from the environment and the watch list file. Any invalid setting is fatal.
    pub fn load() -> BotResult<Self> {
        let watchlist_path = env::var("WATCHLIST_PATH").unwrap_or_else(|_| "watchlist.toml".to_string());
        let raw = std::fs::read_to_string(&watchlist_path)
            .map_err(|e| BotError::config(format!("cannot read watch list {}: {}", watchlist_path, e)))?;
        let watchlist = Watchlist::parse(&raw)?;

        let config = Self {
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            scanner: ScannerSettings {
                poll_interval_ms: env_or("POLL_INTERVAL_MS", 1_000u64)?.max(MIN_POLL_INTERVAL_MS),
                max_backoff_ms: env_or("MAX_POLL_BACKOFF_MS", 30_000u64)?,
                quote_timeout_ms: env_or("QUOTE_TIMEOUT_MS", 2_000u64)?,
                max_quote_age_secs: env_or("MAX_QUOTE_AGE_SECS", 6i64)?,
                max_block_age: env_or("MAX_QUOTE_BLOCK_AGE", 2u64)?,
                channel_capacity: env_or("OBSERVATION_CHANNEL_CAPACITY", 1_024usize)?.max(1),
            },
            risk: RiskLimits {
                min_profit_units: env_or("MIN_PROFIT_UNITS", 1_000_000u128)?,
                min_return_bps: env_or("MIN_RETURN_BPS", 10u32)?,
                max_trade_fraction_bps: env_or("MAX_TRADE_FRACTION_BPS", 5_000u32)?.min(MAX_TRADE_FRACTION_BPS),
                max_volatility_bps: env_or("MAX_VOLATILITY_BPS", 300u32)?,
                volatility_window_secs: env_or("VOLATILITY_WINDOW_SECS", 300u64)?,
                max_consecutive_failures: env_or("MAX_CONSECUTIVE_FAILURES", 3u32)?.max(1),
                loss_window_secs: env_or("LOSS_WINDOW_SECS", 3_600u64)?,
                max_window_loss: env_or("MAX_WINDOW_LOSS_UNITS", 0u128)?,
                cooldown_secs: env_or("CIRCUIT_BREAKER_COOLDOWN_SECS", 300u64)?,
                require_manual_reset: env_or("REQUIRE_MANUAL_RESET", false)?,
                max_inflight_notional: env_or("MAX_INFLIGHT_NOTIONAL", 0u128)?,
            },
            execution: ExecutionSettings {
                flash_loan_premium_bps: env_or("FLASH_LOAN_PREMIUM_BPS", 9u32)?.min(MAX_FLASH_LOAN_PREMIUM_BPS),
                base_slippage_bps: env_or("BASE_SLIPPAGE_BPS", 3u32)?.min(MAX_SLIPPAGE_BPS),
                slippage_tolerance_bps: env_or("SLIPPAGE_TOLERANCE_BPS", 30u32)?.min(MAX_SLIPPAGE_BPS),
                loan_draw_timeout_ms: env_or("LOAN_DRAW_TIMEOUT_MS", 3_000u64)?,
                trade_deadline_secs: env_or("TRADE_DEADLINE_SECS", 60u64)?,
                lender_cap: env_or("LENDER_CAP_UNITS", 0u128)?,
            },
            relay: RelaySettings {
                max_blocks_to_try: env_or("MAX_BLOCKS_TO_TRY", 3u32)?.max(1),
                max_transport_retries: env_or("MAX_RELAY_RETRIES", 3u32)?.max(1),
                priority_fee_escalation_bps: env_or("PRIORITY_FEE_ESCALATION_BPS", 2_500u32)?,
                max_priority_fee_wei: env_or("MAX_PRIORITY_FEE_GWEI", 20u128)?.saturating_mul(1_000_000_000),
                min_bundle_value_wei: env_or("MIN_BUNDLE_VALUE_WEI", 0u128)?,
                block_poll_interval_ms: env_or("BLOCK_POLL_INTERVAL_MS", 500u64)?.max(MIN_POLL_INTERVAL_MS),
                inclusion_timeout_ms: env_or("INCLUSION_TIMEOUT_MS", 36_000u64)?,
            },
            admission: AdmissionSettings {
                burst_capacity: env_or("RATE_BURST_CAPACITY", 10u32)?.max(1),
                refill_per_sec: env_or("RATE_REFILL_PER_SEC", 5u32)?,
                write_window_secs: env_or("WRITE_WINDOW_SECS", 900u64)?,
                max_writes_per_window: env_or("MAX_WRITES_PER_WINDOW", 30u32)?,
                trusted_callers: env::var("TRUSTED_CALLERS")
                    .map(|s| s.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
                    .unwrap_or_default(),
                audit_capacity: env_or("ADMISSION_AUDIT_CAPACITY", 1_000usize)?,
            },
            private_key: env::var("PRIVATE_KEY").ok(),
            relay_signing_key: env::var("RELAY_SIGNING_KEY").ok(),
            confidence_endpoint: env::var("CONFIDENCE_ENDPOINT").ok(),
            networks: watchlist.networks,
            venues: watchlist.venues,
            watch: watchlist.watch,
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults for every scalar setting around a parsed watch list.
    pub fn with_watchlist(watchlist: Watchlist) -> BotResult<Self> {
        let config = Self {
            output_dir: PathBuf::from("output"),
            scanner: ScannerSettings::default(),
            risk: RiskLimits::default(),
            execution: ExecutionSettings::default(),
            relay: RelaySettings::default(),
            admission: AdmissionSettings::default(),
            private_key: None,
            relay_signing_key: None,
            confidence_endpoint: None,
            networks: watchlist.networks,
            venues: watchlist.venues,
            watch: watchlist.watch,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.networks.is_empty() {
            return Err(BotError::config("no networks configured"));
        }

        let mut venue_ids = HashSet::new();
        for venue in &self.venues {
            if !venue_ids.insert(&venue.id) {
                return Err(BotError::config(format!("duplicate venue id '{}'", venue.id)));
            }
            if !self.networks.contains_key(&venue.network) {
                return Err(BotError::UnknownNetwork {
                    network: venue.network.clone(),
                    referenced_by: format!("venue '{}'", venue.id),
                });
            }
            if venue.fee_bps >= 10_000 {
                return Err(BotError::config(format!("venue '{}' fee_bps must be below 10000", venue.id)));
            }
        }

        let mut watch_ids = HashSet::new();
        for entry in &self.watch {
            if !watch_ids.insert(&entry.id) {
                return Err(BotError::MalformedWatchEntry {
                    id: entry.id.to_string(),
                    reason: "duplicate id".to_string(),
                });
            }
            self.validate_entry(entry)?;
        }
        Ok(())
    }

    pub fn validate_entry(&self, entry: &WatchEntry) -> BotResult<()> {
        let malformed = |reason: &str| BotError::MalformedWatchEntry {
            id: entry.id.to_string(),
            reason: reason.to_string(),
        };

        if !self.networks.contains_key(&entry.network) {
            return Err(BotError::UnknownNetwork {
                network: entry.network.clone(),
                referenced_by: format!("watch entry '{}'", entry.id),
            });
        }
        if entry.token_a == entry.token_b {
            return Err(malformed("token_a and token_b are identical"));
        }
        if entry.venue_x == entry.venue_y {
            return Err(malformed("venue_x and venue_y are identical"));
        }
        if entry.notional == 0 {
            return Err(malformed("notional must be positive"));
        }
        for venue_id in [&entry.venue_x, &entry.venue_y] {
            let venue = self
                .venue(venue_id)
                .ok_or_else(|| malformed(&format!("unknown venue '{}'", venue_id)))?;
            if venue.network != entry.network {
                return Err(malformed(&format!(
                    "venue '{}' is on network '{}'",
                    venue_id, venue.network
                )));
            }
        }
        Ok(())
    }

    pub fn venue(&self, id: &VenueId) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| &v.id == id)
    }

    pub fn network(&self, id: &NetworkId) -> Option<&NetworkConfig> {
        self.networks.get(id)
    }

    pub fn watch_entry(&self, id: &WatchId) -> Option<&WatchEntry> {
        self.watch.iter().find(|w| &w.id == id)
    }
}

/// `default` when `key` is unset. A value that is set but does not parse is an error.
fn env_or<T: FromStr>(key: &str, default: T) -> BotResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BotError::config(format!("{} has invalid value {:?}", key, raw))),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(BotError::config(format!("{} is not valid unicode", key))),
    }
}
