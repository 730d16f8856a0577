//! Chain state reads: block height, fee estimates, receipts, nonces

use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use async_trait::async_trait;
use std::sync::Arc;
use crate::{
    errors::{BotError, BotResult},
    types::NetworkId,
    ConcreteProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub base_fee_per_gas: u128,
    pub priority_fee_per_gas: u128,
}

impl FeeEstimate {
    pub fn gas_price(&self) -> u128 {
        self.base_fee_per_gas.saturating_add(self.priority_fee_per_gas)
    }
}

#[async_trait]
pub trait ChainStateSource: Send + Sync {
    fn network(&self) -> &NetworkId;
    async fn block_number(&self) -> BotResult<u64>;
    async fn fee_estimate(&self) -> BotResult<FeeEstimate>;
    /// Block that included `tx_hash`, if any.
    async fn inclusion_block(&self, tx_hash: B256) -> BotResult<Option<u64>>;
    async fn nonce(&self, account: Address) -> BotResult<u64>;
}

pub struct RpcChainState {
    network: NetworkId,
    provider: Arc<ConcreteProvider>,
}

impl RpcChainState {
    pub fn new(network: NetworkId, provider: Arc<ConcreteProvider>) -> Self {
        Self { network, provider }
    }
}

#[async_trait]
impl ChainStateSource for RpcChainState {
    fn network(&self) -> &NetworkId {
        &self.network
    }

    async fn block_number(&self) -> BotResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| BotError::network(format!("{}: failed to get block number", self.network), e))
    }

    async fn fee_estimate(&self) -> BotResult<FeeEstimate> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BotError::network(format!("{}: failed to get gas price", self.network), e))?;
        let priority = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(|e| BotError::network(format!("{}: failed to get priority fee", self.network), e))?;

        Ok(FeeEstimate {
            base_fee_per_gas: gas_price.saturating_sub(priority),
            priority_fee_per_gas: priority,
        })
    }

    async fn inclusion_block(&self, tx_hash: B256) -> BotResult<Option<u64>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| BotError::network(format!("{}: failed to get receipt", self.network), e))?;
        Ok(receipt.and_then(|r| r.block_number))
    }

    async fn nonce(&self, account: Address) -> BotResult<u64> {
        self.provider
            .get_transaction_count(account)
            .await
            .map_err(|e| BotError::network(format!("{}: failed to get nonce", self.network), e))
    }
}
