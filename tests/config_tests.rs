//! Watch list parsing and startup validation.

mod support;

use flashguard_arb::config::{Config, VenueKind, Watchlist};
use flashguard_arb::errors::BotError;
use flashguard_arb::types::{NetworkId, VenueId, WatchId};
use support::fixtures::{token_a, token_b, WATCHLIST};

fn load(raw: &str) -> Result<Config, BotError> {
    Config::with_watchlist(Watchlist::parse(raw)?)
}

const SECOND_ENTRY: &str = r#"
[[watch]]
id = "usdc-dai"
network = "testnet"
token_a = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
token_b = "0xcccccccccccccccccccccccccccccccccccccccc"
venue_x = "venue-x"
venue_y = "venue-y"
notional = "25_000_000_000"
min_profit = 5000000
"#;

#[test]
fn fixture_watch_list_loads_with_defaults() {
    let config = load(WATCHLIST).unwrap();

    let network = config.network(&NetworkId::from("testnet")).unwrap();
    assert_eq!(network.chain_id, 1);
    assert_eq!(network.gas_limit, 500_000);
    assert_eq!(network.native_price_units, 1_000_000_000);

    let venue = config.venue(&VenueId::from("venue-x")).unwrap();
    assert!(matches!(venue.kind, VenueKind::ReservePool { .. }));
    assert_eq!(venue.fee_bps, 30);
    assert!(matches!(
        config.venue(&VenueId::from("venue-y")).unwrap().kind,
        VenueKind::HttpQuote { .. }
    ));

    let entry = config.watch_entry(&WatchId::from("usdc-dai")).unwrap();
    assert_eq!(entry.token_a, token_a());
    assert_eq!(entry.token_b, token_b());
    assert_eq!(entry.notional, 10_000_000_000);
    assert_eq!(entry.min_profit, None);

    assert_eq!(config.risk.min_return_bps, 10);
    assert_eq!(config.relay.max_blocks_to_try, 3);
}

#[test]
fn amounts_may_be_written_as_strings() {
    let raw = format!("{}{}", WATCHLIST, SECOND_ENTRY.replace("\"usdc-dai\"", "\"usdc-ccc\""));
    let config = load(&raw).unwrap();

    let entry = config.watch_entry(&WatchId::from("usdc-ccc")).unwrap();
    assert_eq!(entry.notional, 25_000_000_000);
    assert_eq!(entry.min_profit, Some(5_000_000));
}

#[test]
fn duplicate_watch_id_is_malformed() {
    let raw = format!("{}{}", WATCHLIST, SECOND_ENTRY);
    let err = load(&raw).unwrap_err();

    assert!(matches!(err, BotError::MalformedWatchEntry { ref reason, .. } if reason == "duplicate id"));
    assert!(err.is_fatal());
}

#[test]
fn entry_on_an_unknown_network_is_fatal() {
    let raw = WATCHLIST.replacen("network = \"testnet\"\ntoken_a", "network = \"mainnet\"\ntoken_a", 1);
    let err = load(&raw).unwrap_err();

    assert!(matches!(err, BotError::UnknownNetwork { ref network, .. } if network.0 == "mainnet"));
    assert!(err.is_fatal());
}

#[test]
fn entry_comparing_a_venue_with_itself_is_rejected() {
    let raw = WATCHLIST.replace("venue_y = \"venue-y\"", "venue_y = \"venue-x\"");
    let err = load(&raw).unwrap_err();

    assert!(matches!(err, BotError::MalformedWatchEntry { ref reason, .. } if reason.contains("identical")));
}

#[test]
fn entry_naming_an_undeclared_venue_is_rejected() {
    let raw = WATCHLIST.replace("venue_y = \"venue-y\"", "venue_y = \"venue-z\"");
    let err = load(&raw).unwrap_err();

    assert!(matches!(err, BotError::MalformedWatchEntry { ref reason, .. } if reason.contains("venue-z")));
}

#[test]
fn zero_notional_is_rejected() {
    let raw = WATCHLIST.replace("notional = 10000000000", "notional = 0");
    assert!(matches!(load(&raw), Err(BotError::MalformedWatchEntry { .. })));
}

#[test]
fn unparseable_file_is_a_config_error() {
    let err = Watchlist::parse("[networks.testnet\nchain_id = 1").unwrap_err();
    assert!(matches!(err, BotError::Config { .. }));
    assert!(err.is_fatal());
}

#[test]
fn malformed_environment_value_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchlist.toml");
    std::fs::write(&path, WATCHLIST).unwrap();

    // Only test in this binary that touches the process environment
    unsafe {
        std::env::set_var("WATCHLIST_PATH", &path);
        std::env::set_var("MAX_CONSECUTIVE_FAILURES", "three");
    }
    let err = Config::load().unwrap_err();
    assert!(matches!(err, BotError::Config { ref message } if message.contains("MAX_CONSECUTIVE_FAILURES")));
    assert!(err.is_fatal());

    unsafe {
        std::env::set_var("MAX_CONSECUTIVE_FAILURES", "4");
    }
    assert_eq!(Config::load().unwrap().risk.max_consecutive_failures, 4);

    unsafe {
        std::env::remove_var("MAX_CONSECUTIVE_FAILURES");
        std::env::remove_var("WATCHLIST_PATH");
    }
}
