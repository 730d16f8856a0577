use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use flashguard_arb::config::{Config, Watchlist};
use flashguard_arb::types::{NetworkId, PriceQuote, SpreadObservation, VenueId, WatchId};
use rust_decimal::Decimal;

/// 1 USDC in raw units.
pub const USDC: u128 = 1_000_000;
pub const NOTIONAL: u128 = 10_000 * USDC;
/// Deep enough that round-trip price impact on `NOTIONAL` stays under the base slippage
/// allowance.
pub const DEEP_LIQUIDITY: u128 = 1_000_000_000 * USDC;

pub const NETWORK: &str = "testnet";
pub const WATCH_ID: &str = "usdc-dai";
pub const VENUE_X: &str = "venue-x";
pub const VENUE_Y: &str = "venue-y";

pub fn token_a() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn token_b() -> Address {
    Address::repeat_byte(0xbb)
}

pub const WATCHLIST: &str = r#"
[networks.testnet]
chain_id = 1
rpc_url = "http://127.0.0.1:8545"
relay_url = "http://127.0.0.1:9545"
executor = "0x00000000000000000000000000000000000000e1"
gas_limit = 500000
native_price_units = 1000000000

[[venues]]
id = "venue-x"
network = "testnet"
kind = "reserve-pool"
factory = "0x00000000000000000000000000000000000000f1"

[[venues]]
id = "venue-y"
network = "testnet"
kind = "http-quote"
endpoint = "http://127.0.0.1:7000"
router = "0x00000000000000000000000000000000000000f2"

[[watch]]
id = "usdc-dai"
network = "testnet"
token_a = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
token_b = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
venue_x = "venue-x"
venue_y = "venue-y"
notional = 10000000000
"#;

/// Defaults around the fixture watch list, tuned so tests never wait on real time.
pub fn test_config() -> Config {
    test_config_from(WATCHLIST)
}

pub fn test_config_from(raw: &str) -> Config {
    let watchlist = Watchlist::parse(raw).expect("fixture watch list parses");
    let mut config = Config::with_watchlist(watchlist).expect("fixture config is valid");
    config.scanner.poll_interval_ms = 10;
    config.scanner.max_backoff_ms = 80;
    config.relay.block_poll_interval_ms = 5;
    config.relay.inclusion_timeout_ms = 500;
    config.admission.burst_capacity = 1_000;
    config.admission.refill_per_sec = 1_000;
    config
}

pub fn quote(venue: &str, price: Decimal, liquidity: u128, block: u64, at: DateTime<Utc>) -> PriceQuote {
    let venue_byte = if venue == VENUE_X { 0x11 } else { 0x22 };
    PriceQuote {
        network: NetworkId::from(NETWORK),
        venue: VenueId::from(venue),
        venue_address: Address::repeat_byte(venue_byte),
        token_in: token_a(),
        token_out: token_b(),
        price,
        available_liquidity: liquidity,
        observed_at_block: block,
        observed_at: at,
    }
}

/// A 50 bps gap: sell on `venue-y` at 1.005, buy back on `venue-x` at 1.000.
pub fn observation(notional: u128, liquidity: u128) -> SpreadObservation {
    observation_with_prices(notional, liquidity, Decimal::new(1005, 3), Decimal::ONE)
}

pub fn observation_with_prices(notional: u128, liquidity: u128, high: Decimal, low: Decimal) -> SpreadObservation {
    let now = Utc::now();
    let first_leg = quote(VENUE_Y, high, liquidity, 100, now);
    let second_leg = quote(VENUE_X, low, liquidity, 100, now);
    SpreadObservation {
        watch_id: WatchId::from(WATCH_ID),
        pair: flashguard_arb::types::PairKey::new(NetworkId::from(NETWORK), token_a(), token_b()),
        spread_bps: flashguard_arb::scanner::spread_bps(high, low),
        first_leg,
        second_leg,
        notional,
        observed_at: now,
    }
}

/// 9 gwei base + 1 gwei tip, i.e. 10 gwei: 500k gas costs 5 USDC at the fixture's native price.
pub const GAS_PRICE_WEI: u128 = 10_000_000_000;
