//! FlashGuard arbitrage engine - main entry point

use alloy::signers::local::PrivateKeySigner;
use anyhow::Result;
use flashguard_arb::{
    arbitrage::{ConfidenceModel, HttpConfidenceModel, NeutralConfidence},
    execution::{DryRunSettlement, LocalTransactionSigner, TransactionSigner},
    network::{setup_providers, ChainStateSource, RpcChainState},
    pipeline::{Pipeline, PipelineParts},
    quotes::build_quote_sources,
    relay::{FlashbotsRelay, PrivateRelay},
    utils::{self, system_clock},
    *,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

const RELAY_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const CONFIDENCE_TIMEOUT: Duration = Duration::from_millis(500);
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    utils::setup_output_directories(&config.output_dir)?;
    let _logging_guard = utils::setup_logging(&config.output_dir)?;

    info!("🛡️  FlashGuard Arbitrage Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Networks: {}", config.networks.len());
    info!("   Venues: {}", config.venues.len());
    info!("   Watch entries: {}", config.watch.len());
    info!("   Min profit: {} units / {} bps", config.risk.min_profit_units, config.risk.min_return_bps);
    info!("   Max trade fraction: {} bps", config.risk.max_trade_fraction_bps);
    info!("   Flash loan premium: {} bps", config.execution.flash_loan_premium_bps);
    info!("   Relay blocks to try: {}", config.relay.max_blocks_to_try);

    let providers = setup_providers(&config).await?;

    let mut chains: HashMap<NetworkId, Arc<dyn ChainStateSource>> = HashMap::new();
    for (network, provider) in &providers {
        chains.insert(network.clone(), Arc::new(RpcChainState::new(network.clone(), provider.clone())));
    }

    let relay_key = match &config.relay_signing_key {
        Some(key) => key.clone(),
        None => {
            warn!("⚠️ RELAY_SIGNING_KEY not set, using an ephemeral relay identity");
            format!("{}", PrivateKeySigner::random().to_bytes())
        }
    };
    let mut relays: HashMap<NetworkId, Arc<dyn PrivateRelay>> = HashMap::new();
    for (network, network_config) in &config.networks {
        let chain = chains
            .get(network)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no chain state for {}", network))?;
        let relay = FlashbotsRelay::new(network_config.relay_url.clone(), &relay_key, chain, RELAY_HTTP_TIMEOUT)?;
        info!("📡 {} relay {} (auth {})", network, network_config.relay_url, relay.auth_address());
        relays.insert(network.clone(), Arc::new(relay));
    }

    let signer: Arc<dyn TransactionSigner> = match &config.private_key {
        Some(key) => Arc::new(LocalTransactionSigner::from_private_key(key)?),
        None => {
            warn!("⚠️ PRIVATE_KEY not set, signing with a throwaway key (dry run)");
            Arc::new(LocalTransactionSigner::random())
        }
    };
    info!("🔑 Executor account: {}", signer.address());

    let confidence: Arc<dyn ConfidenceModel> = match &config.confidence_endpoint {
        Some(endpoint) => Arc::new(HttpConfidenceModel::new(endpoint.clone(), CONFIDENCE_TIMEOUT)?),
        None => Arc::new(NeutralConfidence),
    };

    let settlement = Arc::new(DryRunSettlement::new(
        config.execution.flash_loan_premium_bps,
        config.execution.lender_cap,
    ));
    let sources = build_quote_sources(&config, &providers)?;
    let output_dir = config.output_dir.clone();

    let pipeline = Pipeline::new(PipelineParts {
        config: ConfigHandle::new(config),
        sources,
        chains,
        relays,
        settlement,
        signer,
        confidence,
        clock: system_clock(),
    })?;

    let _recorder = pipeline.spawn_recorder(output_dir);
    let dispatcher = pipeline.start()?;

    info!("\n🚀 Scanning...\n");

    let mut interval = time::interval(STATS_INTERVAL);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let health = pipeline.health();
                info!(
                    "🏥 Health: running={} paused={} in_flight={} breaker_open={} failures={} config_v{}",
                    health.watch_entries_running,
                    health.watch_entries_paused,
                    health.trades_in_flight,
                    health.circuit_breaker_open,
                    health.consecutive_failures,
                    health.config_version
                );
                utils::print_session_stats(pipeline.start_time(), &pipeline.stats(), &pipeline.breaker());
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                break;
            }
        }
    }

    pipeline.shutdown();
    dispatcher.abort();

    info!("\n🛑 Shutting down gracefully...");
    utils::print_session_stats(pipeline.start_time(), &pipeline.stats(), &pipeline.breaker());

    Ok(())
}
