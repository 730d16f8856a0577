//! Flashbots-style relay over JSON-RPC
//!
//! Requests carry `X-Flashbots-Signature: <address>:<signature>`, an EIP-191 signature
//! over the hex keccak of the body. Inclusion is read from the chain: included once the
//! first transaction has a receipt, not included once the chain moves past the target.

use alloy::{
    hex,
    primitives::{keccak256, Address, Bytes, B256},
    signers::{local::PrivateKeySigner, Signer},
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use crate::{
    errors::{BotError, BotResult},
    network::ChainStateSource,
    types::{RelayInclusion, SimulationResult},
};
use super::PrivateRelay;

pub const FLASHBOTS_SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// Submissions never polled to a verdict are dropped this many blocks after their target.
const SUBMISSION_RETENTION_BLOCKS: u64 = 64;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleResult {
    #[serde(default)]
    results: Vec<CallBundleTx>,
    #[serde(default)]
    total_gas_used: u64,
    #[serde(default)]
    coinbase_diff: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallBundleTx {
    error: Option<String>,
    revert: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResult {
    bundle_hash: String,
}

#[derive(Debug, Clone, Copy)]
struct Submission {
    first_tx: B256,
    target_block: u64,
}

pub struct FlashbotsRelay {
    url: String,
    client: reqwest::Client,
    auth: PrivateKeySigner,
    chain: Arc<dyn ChainStateSource>,
    submissions: DashMap<String, Submission>,
}

impl FlashbotsRelay {
    pub fn new(
        url: String,
        signing_key: &str,
        chain: Arc<dyn ChainStateSource>,
        timeout: Duration,
    ) -> BotResult<Self> {
        let auth = PrivateKeySigner::from_str(signing_key).map_err(|e| BotError::Signing {
            message: format!("invalid relay signing key: {}", e),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::network("Failed to build HTTP client", e))?;
        Ok(Self {
            url,
            client,
            auth,
            chain,
            submissions: DashMap::new(),
        })
    }

    pub fn auth_address(&self) -> Address {
        self.auth.address()
    }

    /// Submissions still waiting for an inclusion verdict.
    pub fn tracked_submissions(&self) -> usize {
        self.submissions.len()
    }

    async fn signature_header(&self, body: &str) -> BotResult<String> {
        let digest = format!("{}", keccak256(body.as_bytes()));
        let signature = self
            .auth
            .sign_message(digest.as_bytes())
            .await
            .map_err(|e| BotError::Signing { message: e.to_string() })?;
        Ok(format!("{}:{}", self.auth.address(), hex::encode_prefixed(signature.as_bytes())))
    }

    async fn rpc(&self, method: &str, params: Value) -> BotResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
        .to_string();
        let signature = self.signature_header(&body).await?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(FLASHBOTS_SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| BotError::network(format!("{} request failed", method), e))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(BotError::Network {
                message: format!("{} returned {}", method, status),
                source: None,
                retry_count: 0,
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::relay(format!("{} returned {}: {}", method, status, text)));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| BotError::network(format!("{} returned invalid JSON", method), e))?;
        if let Some(error) = parsed.error {
            return Err(BotError::relay(format!("{} rejected ({}): {}", method, error.code, error.message)));
        }
        parsed
            .result
            .ok_or_else(|| BotError::relay(format!("{} returned no result", method)))
    }

    fn encode_txs(transactions: &[Bytes]) -> Vec<String> {
        transactions.iter().map(hex::encode_prefixed).collect()
    }
}

#[async_trait]
impl PrivateRelay for FlashbotsRelay {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn simulate(&self, transactions: &[Bytes], block: u64) -> BotResult<SimulationResult> {
        let params = json!([{
            "txs": Self::encode_txs(transactions),
            "blockNumber": format!("0x{:x}", block),
            "stateBlockNumber": "latest",
        }]);
        let result = self.rpc("eth_callBundle", params).await?;
        let parsed: CallBundleResult = serde_json::from_value(result)
            .map_err(|e| BotError::relay(format!("unexpected eth_callBundle result: {}", e)))?;

        let revert_reason = parsed
            .results
            .iter()
            .find_map(|tx| tx.revert.clone().or_else(|| tx.error.clone()));
        let net_value_wei = parsed
            .coinbase_diff
            .as_deref()
            .and_then(|v| v.parse::<u128>().ok())
            .unwrap_or(0);

        debug!(block, gas = parsed.total_gas_used, net_value_wei, "Bundle simulated");
        Ok(SimulationResult {
            success: revert_reason.is_none(),
            gas_used: parsed.total_gas_used,
            net_value_wei,
            revert_reason,
        })
    }

    async fn submit(&self, transactions: &[Bytes], block: u64) -> BotResult<String> {
        let first = transactions
            .first()
            .ok_or_else(|| BotError::relay("empty bundle"))?;
        let params = json!([{
            "txs": Self::encode_txs(transactions),
            "blockNumber": format!("0x{:x}", block),
        }]);
        let result = self.rpc("eth_sendBundle", params).await?;
        let parsed: SendBundleResult = serde_json::from_value(result)
            .map_err(|e| BotError::relay(format!("unexpected eth_sendBundle result: {}", e)))?;

        let id = format!("{}@{}", parsed.bundle_hash, block);
        self.submissions
            .retain(|_, s| s.target_block.saturating_add(SUBMISSION_RETENTION_BLOCKS) >= block);
        self.submissions.insert(
            id.clone(),
            Submission {
                first_tx: keccak256(first),
                target_block: block,
            },
        );
        Ok(id)
    }

    async fn inclusion_status(&self, submission_id: &str) -> BotResult<RelayInclusion> {
        let submission = *self
            .submissions
            .get(submission_id)
            .ok_or_else(|| BotError::relay(format!("unknown submission {}", submission_id)))?;

        let verdict = if let Some(block) = self.chain.inclusion_block(submission.first_tx).await? {
            RelayInclusion::Included { block }
        } else if self.chain.block_number().await? > submission.target_block {
            RelayInclusion::NotIncluded
        } else {
            return Ok(RelayInclusion::Pending);
        };
        self.submissions.remove(submission_id);
        Ok(verdict)
    }
}
