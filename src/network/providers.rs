//! Network provider setup

use alloy::providers::{Provider, ProviderBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use crate::{
    config::{Config, NetworkConfig},
    errors::{BotError, BotResult},
    network::retry::{retry_with_backoff, RetryConfig},
    types::NetworkId,
    ConcreteProvider,
};

pub async fn setup_provider(network: &NetworkId, config: &NetworkConfig) -> BotResult<Arc<ConcreteProvider>> {
    let url = config
        .rpc_url
        .parse()
        .map_err(|e| BotError::config(format!("invalid rpc_url for {}: {}", network, e)))?;

    let provider: Arc<ConcreteProvider> = Arc::new(ProviderBuilder::new().on_http(url).boxed());

    info!("🔗 Testing connection to {}...", network);
    let chain_id = retry_with_backoff(
        || async {
            provider
                .get_chain_id()
                .await
                .map_err(|e| BotError::network("Failed to get chain id", e))
        },
        &RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 10000,
            exponential_base: 2.0,
        },
        &format!("{} connection", network),
    )
    .await
    .map_err(|e| {
        warn!("⚠️ Network connection attempt failed: {}", e);
        e
    })?;

    if chain_id != config.chain_id {
        return Err(BotError::config(format!(
            "{} rpc reports chain id {}, expected {}",
            network, chain_id, config.chain_id
        )));
    }

    info!("✅ Connected to {} (chain id {})", network, chain_id);
    Ok(provider)
}

/// One provider per configured network. Fails if any network is unreachable.
pub async fn setup_providers(config: &Config) -> BotResult<HashMap<NetworkId, Arc<ConcreteProvider>>> {
    let mut providers = HashMap::new();
    for (id, network) in &config.networks {
        providers.insert(id.clone(), setup_provider(id, network).await?);
    }
    Ok(providers)
}
