//! Market identifiers and normalized price quotes

use alloy::primitives::Address;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(pub String);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for WatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Order-independent key of a token pair on one network. Single-flight and
/// volatility tracking are keyed by this, so A/B and B/A share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PairKey {
    pub network: NetworkId,
    pub low: Address,
    pub high: Address,
}

impl PairKey {
    pub fn new(network: NetworkId, a: Address, b: Address) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self { network, low, high }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.network, self.low, self.high)
    }
}

/// A venue's price for swapping `token_in` into `token_out`.
///
/// `price` is raw `token_out` units received per raw `token_in` unit, net of the venue's
/// swap fee. `available_liquidity` is the venue's depth in raw `token_in` units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub network: NetworkId,
    pub venue: VenueId,
    pub venue_address: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub price: Decimal,
    pub available_liquidity: u128,
    pub observed_at_block: u64,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        now.signed_duration_since(self.observed_at)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: ChronoDuration) -> bool {
        let age = self.age(now);
        // Quotes stamped in the future are treated as fresh only within the same window
        age <= max_age && age >= -max_age
    }
}
