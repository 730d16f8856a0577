//! Admin surface: admission limits, trusted bypass and runtime changes.

mod support;

use chrono::Utc;
use flashguard_arb::admission::AdmissionController;
use flashguard_arb::config::{Config, ConfigHandle};
use flashguard_arb::control::{AdminControl, ADMIN_ENDPOINT};
use flashguard_arb::errors::{BotError, CircuitBreaker};
use flashguard_arb::quotes::{QuoteSource, QuoteSources};
use flashguard_arb::scanner::Scanner;
use flashguard_arb::types::{VenueId, WatchId};
use flashguard_arb::utils::ManualClock;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use support::fakes::FakeQuoteSource;
use support::fixtures::{quote, test_config, DEEP_LIQUIDITY, VENUE_X, VENUE_Y, WATCH_ID};

struct Admin {
    control: AdminControl,
    scanner: Arc<Scanner>,
    breaker: Arc<CircuitBreaker>,
    admission: Arc<AdmissionController>,
    config: ConfigHandle,
    clock: ManualClock,
}

fn admin(mut config: Config) -> Admin {
    config.admission.trusted_callers = vec!["ops".to_string()];
    config.admission.max_writes_per_window = 3;

    let x = Arc::new(FakeQuoteSource::new(VENUE_X));
    let y = Arc::new(FakeQuoteSource::new(VENUE_Y));
    x.push(quote(VENUE_X, dec!(1.000), DEEP_LIQUIDITY, 100, Utc::now()));
    y.push(quote(VENUE_Y, dec!(1.005), DEEP_LIQUIDITY, 100, Utc::now()));
    let mut sources: QuoteSources = HashMap::new();
    sources.insert(VenueId::from(VENUE_X), x as Arc<dyn QuoteSource>);
    sources.insert(VenueId::from(VENUE_Y), y as Arc<dyn QuoteSource>);

    let clock = ManualClock::new();
    let admission = Arc::new(AdmissionController::new(config.admission.clone(), Arc::new(clock.clone())));
    let config = ConfigHandle::new(config);
    let (tx, _rx) = mpsc::channel(16);
    let scanner = Arc::new(Scanner::new(Arc::new(sources), admission.clone(), config.clone(), tx));
    scanner.start_all().unwrap();
    let breaker = Arc::new(CircuitBreaker::new(Arc::new(clock.clone())));
    let control = AdminControl::new(scanner.clone(), breaker.clone(), config.clone(), admission.clone());

    Admin {
        control,
        scanner,
        breaker,
        admission,
        config,
        clock,
    }
}

#[tokio::test]
async fn writes_beyond_the_window_are_denied() {
    let admin = admin(test_config());
    let id = WatchId::from(WATCH_ID);

    admin.control.pause("alice", &id).unwrap();
    admin.control.resume("alice", &id).unwrap();
    admin.control.pause("alice", &id).unwrap();
    let err = admin.control.resume("alice", &id).unwrap_err();

    assert!(matches!(err, BotError::AdmissionDenied { ref reason, .. } if reason == "write-window-exhausted"));
    assert!(err.is_transient());
    assert_eq!(admin.scanner.is_paused(&id), Some(true));

    // Reads are not charged against the write window
    assert!(admin.control.breaker_status("alice").is_ok());
    // Another caller has its own window
    admin.control.resume("bob", &id).unwrap();

    admin.clock.advance(Duration::from_secs(901));
    admin.control.pause("alice", &id).unwrap();
    admin.scanner.shutdown();
}

#[tokio::test]
async fn trusted_caller_bypasses_and_is_audited() {
    let admin = admin(test_config());
    let id = WatchId::from(WATCH_ID);

    for _ in 0..5 {
        admin.control.pause("ops", &id).unwrap();
    }

    assert!(admin.admission.is_trusted("ops"));
    let audit = admin.admission.bypass_audit();
    assert_eq!(audit.len(), 5);
    assert!(audit.iter().all(|r| r.caller == "ops" && r.endpoint == ADMIN_ENDPOINT));
    admin.scanner.shutdown();
}

#[tokio::test]
async fn unknown_entries_are_reported() {
    let admin = admin(test_config());
    let missing = WatchId::from("nope");

    assert!(matches!(admin.control.pause("ops", &missing), Err(BotError::MalformedWatchEntry { .. })));
    assert!(matches!(admin.control.resume("ops", &missing), Err(BotError::MalformedWatchEntry { .. })));
    assert!(matches!(
        admin.control.remove_watch_entry("ops", &missing),
        Err(BotError::MalformedWatchEntry { .. })
    ));
    admin.scanner.shutdown();
}

#[tokio::test]
async fn watch_entries_can_be_added_and_removed_at_runtime() {
    let admin = admin(test_config());
    let version = admin.config.version();

    let existing = admin.config.snapshot().config.watch[0].clone();
    assert!(matches!(
        admin.control.add_watch_entry("ops", existing.clone()),
        Err(BotError::MalformedWatchEntry { .. })
    ));

    let mut added = existing;
    added.id = WatchId::from("usdc-dai-large");
    added.notional *= 2;
    let after_add = admin.control.add_watch_entry("ops", added).unwrap();
    assert_eq!(after_add, version + 1);
    assert_eq!(admin.scanner.counts(), (2, 0));
    assert!(admin.config.snapshot().config.watch_entry(&WatchId::from("usdc-dai-large")).is_some());

    let after_remove = admin.control.remove_watch_entry("ops", &WatchId::from(WATCH_ID)).unwrap();
    assert_eq!(after_remove, version + 2);
    assert_eq!(admin.scanner.counts(), (1, 0));
    assert!(admin.config.snapshot().config.watch_entry(&WatchId::from(WATCH_ID)).is_none());
    admin.scanner.shutdown();
}

#[tokio::test]
async fn risk_limits_are_validated_and_versioned() {
    let admin = admin(test_config());
    let version = admin.config.version();

    let mut limits = admin.config.snapshot().config.risk.clone();
    limits.max_consecutive_failures = 0;
    assert!(matches!(admin.control.update_risk_limits("ops", limits), Err(BotError::Config { .. })));
    assert_eq!(admin.config.version(), version);

    let mut limits = admin.config.snapshot().config.risk.clone();
    limits.min_return_bps = 25;
    assert_eq!(admin.control.update_risk_limits("ops", limits).unwrap(), version + 1);
    assert_eq!(admin.config.snapshot().config.risk.min_return_bps, 25);
    admin.scanner.shutdown();
}

#[tokio::test]
async fn forced_trip_closes_only_after_reset_and_cooldown() {
    let admin = admin(test_config());

    admin.control.force_trip("ops", "suspicious fills").unwrap();
    let status = admin.control.breaker_status("ops").unwrap();
    assert!(status.is_open);
    assert!(status.reason.unwrap().contains("suspicious fills"));

    // Cool-down still running
    let status = admin.control.reset_breaker("ops").unwrap();
    assert!(status.is_open);

    admin.clock.advance(Duration::from_secs(301));
    let status = admin.control.reset_breaker("ops").unwrap();
    assert!(!status.is_open);
    assert_eq!(status.consecutive_failures, 0);

    let limits = admin.config.snapshot().config.risk.clone();
    assert!(!admin.breaker.snapshot(&limits).is_open);
    admin.scanner.shutdown();
}
