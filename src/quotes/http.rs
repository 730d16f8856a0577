//! Quotes from an off-chain venue API

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use crate::{
    errors::{BotError, BotResult},
    types::{NetworkId, PriceQuote, VenueId},
};
use super::QuoteSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    price: String,
    liquidity: String,
    block_number: u64,
}

pub struct HttpQuoteSource {
    venue: VenueId,
    endpoint: String,
    router: Address,
    client: reqwest::Client,
}

impl HttpQuoteSource {
    pub fn new(venue: VenueId, endpoint: String, router: Address, timeout: Duration) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::network("Failed to build HTTP client", e))?;
        Ok(Self {
            venue,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            router,
            client,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> BotError {
        BotError::MalformedQuote {
            venue: self.venue.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_quote(&self, network: &NetworkId, token_in: Address, token_out: Address) -> BotResult<PriceQuote> {
        let response = self
            .client
            .get(format!("{}/quote", self.endpoint))
            .query(&[
                ("network", network.to_string()),
                ("tokenIn", token_in.to_string()),
                ("tokenOut", token_out.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BotError::network(format!("{} quote request failed", self.venue), e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("⚠️ {} returned error status {}: {}", self.venue, status, body);
            return Err(BotError::Network {
                message: format!("{} quote API error: {}", self.venue, status),
                source: None,
                retry_count: 0,
            });
        }

        let body: QuoteResponse = response
            .json()
            .await
            .map_err(|e| self.malformed(format!("invalid JSON: {}", e)))?;

        let price = Decimal::from_str(&body.price).map_err(|e| self.malformed(format!("price: {}", e)))?;
        let liquidity = body
            .liquidity
            .parse::<u128>()
            .map_err(|e| self.malformed(format!("liquidity: {}", e)))?;

        Ok(PriceQuote {
            network: network.clone(),
            venue: self.venue.clone(),
            venue_address: self.router,
            token_in,
            token_out,
            price,
            available_liquidity: liquidity,
            observed_at_block: body.block_number,
            observed_at: Utc::now(),
        })
    }
}
