//! Private relay capability and the bundle producer the client drives

use alloy::primitives::Bytes;
use async_trait::async_trait;
use crate::errors::BotResult;
use crate::types::{AttemptPricing, RelayInclusion, SimulationResult};

/// Transport failures surface as `BotError::Network` (retried); an explicit refusal by
/// the relay surfaces as `BotError::Relay` (terminal).
#[async_trait]
pub trait PrivateRelay: Send + Sync {
    /// Logical endpoint name used as the admission key.
    fn endpoint(&self) -> &str;

    async fn simulate(&self, transactions: &[Bytes], block: u64) -> BotResult<SimulationResult>;

    /// Returns the relay's submission id.
    async fn submit(&self, transactions: &[Bytes], block: u64) -> BotResult<String>;

    async fn inclusion_status(&self, submission_id: &str) -> BotResult<RelayInclusion>;
}

/// Produces freshly signed transactions for each attempt.
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn build(&self, pricing: &AttemptPricing) -> BotResult<Vec<Bytes>>;

    /// Whether resubmitting at `pricing` is still expected to profit.
    fn still_profitable(&self, pricing: &AttemptPricing) -> bool;
}
