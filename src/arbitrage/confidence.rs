//! Optional confidence scoring with a neutral fallback

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use crate::errors::{BotError, BotResult};
use crate::types::ArbitrageOpportunity;

pub const NEUTRAL_CONFIDENCE: Decimal = dec!(0.5);

/// Scores an opportunity in `[0, 1]`. Implementations never fail the pipeline.
#[async_trait]
pub trait ConfidenceModel: Send + Sync {
    async fn score(&self, opportunity: &ArbitrageOpportunity) -> Decimal;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralConfidence;

#[async_trait]
impl ConfidenceModel for NeutralConfidence {
    async fn score(&self, _opportunity: &ArbitrageOpportunity) -> Decimal {
        NEUTRAL_CONFIDENCE
    }
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: Decimal,
}

pub struct HttpConfidenceModel {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpConfidenceModel {
    pub fn new(endpoint: String, timeout: Duration) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::network("Failed to build HTTP client", e))?;
        Ok(Self { endpoint, client })
    }

    async fn fetch(&self, opportunity: &ArbitrageOpportunity) -> BotResult<Decimal> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(opportunity)
            .send()
            .await
            .map_err(|e| BotError::network("confidence request failed", e))?
            .error_for_status()
            .map_err(|e| BotError::network("confidence model returned an error", e))?;
        let body: ScoreResponse = response
            .json()
            .await
            .map_err(|e| BotError::network("invalid confidence response", e))?;
        Ok(body.score.clamp(Decimal::ZERO, Decimal::ONE))
    }
}

#[async_trait]
impl ConfidenceModel for HttpConfidenceModel {
    async fn score(&self, opportunity: &ArbitrageOpportunity) -> Decimal {
        match self.fetch(opportunity).await {
            Ok(score) => {
                debug!(opportunity_id = %opportunity.id, %score, "Confidence scored");
                score
            }
            Err(e) => {
                warn!("⚠️ Confidence model unavailable, using neutral score: {}", e);
                NEUTRAL_CONFIDENCE
            }
        }
    }
}
