//! Watch list file format: networks, venues and the pairs to scan

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use crate::errors::{BotError, BotResult};
use crate::types::{NetworkId, PairKey, VenueId, WatchId};
use super::settings::DEFAULT_GAS_LIMIT;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub relay_url: String,
    /// Settlement contract that runs the borrow, both swaps and the repayment.
    pub executor: Address,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Raw borrowed-asset units worth one native token (1e18 wei).
    #[serde(deserialize_with = "de_units")]
    pub native_price_units: u128,
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VenueKind {
    /// Constant-product pools discovered through a factory's `getPair`.
    ReservePool { factory: Address },
    /// Off-chain quote API backed by an on-chain router.
    HttpQuote { endpoint: String, router: Address },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueConfig {
    pub id: VenueId,
    pub network: NetworkId,
    #[serde(flatten)]
    pub kind: VenueKind,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
}

fn default_fee_bps() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchEntry {
    pub id: WatchId,
    pub network: NetworkId,
    pub token_a: Address,
    pub token_b: Address,
    pub venue_x: VenueId,
    pub venue_y: VenueId,
    /// Borrowed `token_a` amount per trade, in raw units.
    #[serde(deserialize_with = "de_units")]
    pub notional: u128,
    #[serde(default, deserialize_with = "de_opt_units")]
    pub min_profit: Option<u128>,
}

impl WatchEntry {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.network.clone(), self.token_a, self.token_b)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Watchlist {
    pub networks: BTreeMap<NetworkId, NetworkConfig>,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
    #[serde(default)]
    pub watch: Vec<WatchEntry>,
}

impl Watchlist {
    pub fn parse(raw: &str) -> BotResult<Self> {
        toml::from_str(raw).map_err(|e| BotError::config(format!("malformed watch list: {}", e)))
    }
}

// TOML integers stop at i64, so large raw amounts are also accepted as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnits {
    Int(u64),
    Str(String),
}

impl RawUnits {
    fn into_units<E: serde::de::Error>(self) -> Result<u128, E> {
        match self {
            RawUnits::Int(v) => Ok(v as u128),
            RawUnits::Str(s) => s
                .replace('_', "")
                .parse::<u128>()
                .map_err(|e| E::custom(format!("invalid amount '{}': {}", s, e))),
        }
    }
}

fn de_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    RawUnits::deserialize(deserializer)?.into_units()
}

fn de_opt_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
    Option::<RawUnits>::deserialize(deserializer)?
        .map(RawUnits::into_units)
        .transpose()
}
