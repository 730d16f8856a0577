//! Constant-product pool quotes read from on-chain reserves

use alloy::{
    primitives::{keccak256, Address, U256},
    providers::Provider,
    rpc::types::eth::TransactionRequest,
    sol_types::SolValue,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::prelude::*;
use std::sync::Arc;
use tracing::debug;
use crate::{
    errors::{BotError, BotResult},
    types::{NetworkId, PriceQuote, VenueId},
    ConcreteProvider,
};
use super::QuoteSource;

pub struct ReservePoolSource {
    venue: VenueId,
    endpoint: String,
    provider: Arc<ConcreteProvider>,
    factory: Address,
    fee_bps: u32,
    pairs: DashMap<(Address, Address), Address>,
}

impl ReservePoolSource {
    pub fn new(venue: VenueId, provider: Arc<ConcreteProvider>, factory: Address, fee_bps: u32) -> Self {
        Self {
            endpoint: format!("{}:{}", venue, factory),
            venue,
            provider,
            factory,
            fee_bps,
            pairs: DashMap::new(),
        }
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> BotResult<alloy::primitives::Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.provider.call(&tx).await.map_err(|e| BotError::Contract {
            contract: to,
            message: format!("eth_call failed for {}", self.venue),
            source: e.into(),
        })
    }

    async fn pair_address(&self, token_a: Address, token_b: Address) -> BotResult<Address> {
        let key = if token_a <= token_b { (token_a, token_b) } else { (token_b, token_a) };
        if let Some(pair) = self.pairs.get(&key) {
            return Ok(*pair);
        }

        let mut data = keccak256("getPair(address,address)")[..4].to_vec();
        data.extend_from_slice(&(key.0, key.1).abi_encode_params());
        let result = self.call(self.factory, data).await?;
        let pair = Address::abi_decode(&result, true).map_err(|e| self.malformed(format!("getPair: {}", e)))?;
        if pair == Address::ZERO {
            return Err(self.malformed(format!("no pool for {}/{}", token_a, token_b)));
        }

        debug!(venue = %self.venue, %pair, "Resolved pool");
        self.pairs.insert(key, pair);
        Ok(pair)
    }

    async fn reserves(&self, pair: Address) -> BotResult<(Address, U256, U256)> {
        let token0_data = keccak256("token0()")[..4].to_vec();
        let reserves_data = keccak256("getReserves()")[..4].to_vec();

        let token0_raw = self.call(pair, token0_data).await?;
        let token0 = Address::abi_decode(&token0_raw, true).map_err(|e| self.malformed(format!("token0: {}", e)))?;

        let reserves_raw = self.call(pair, reserves_data).await?;
        let decoded = <(U256, U256, U256)>::abi_decode(&reserves_raw, true)
            .map_err(|e| self.malformed(format!("getReserves: {}", e)))?;
        Ok((token0, decoded.0, decoded.1))
    }

    fn malformed(&self, reason: String) -> BotError {
        BotError::MalformedQuote {
            venue: self.venue.clone(),
            reason,
        }
    }
}

#[async_trait]
impl QuoteSource for ReservePoolSource {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_quote(&self, network: &NetworkId, token_in: Address, token_out: Address) -> BotResult<PriceQuote> {
        let pair = self.pair_address(token_in, token_out).await?;
        let (token0, r0, r1) = self.reserves(pair).await?;
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| BotError::network("Failed to get block number", e))?;

        if r0.is_zero() || r1.is_zero() {
            return Err(self.malformed("pool has zero reserves".to_string()));
        }
        let (reserve_in, reserve_out) = if token0 == token_in { (r0, r1) } else { (r1, r0) };

        let to_decimal = |v: U256| {
            Decimal::from_str(&v.to_string()).map_err(|e| self.malformed(format!("reserve out of range: {}", e)))
        };
        let fee_factor = Decimal::from(10_000 - self.fee_bps.min(9_999)) / Decimal::from(10_000);
        let price = to_decimal(reserve_out)? / to_decimal(reserve_in)? * fee_factor;

        Ok(PriceQuote {
            network: network.clone(),
            venue: self.venue.clone(),
            venue_address: pair,
            token_in,
            token_out,
            price,
            available_liquidity: reserve_in.saturating_to::<u128>(),
            observed_at_block: block,
            observed_at: Utc::now(),
        })
    }
}
