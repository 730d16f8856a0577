//! Quote source capability shared by every venue adapter

use alloy::primitives::Address;
use async_trait::async_trait;
use crate::errors::BotResult;
use crate::types::{NetworkId, PriceQuote, VenueId};

#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn venue(&self) -> &VenueId;

    /// Logical endpoint name used as the admission key.
    fn endpoint(&self) -> &str;

    /// Price for swapping `token_in` into `token_out`, normalized to raw units.
    async fn get_quote(
        &self,
        network: &NetworkId,
        token_in: Address,
        token_out: Address,
    ) -> BotResult<PriceQuote>;
}
