//! Private relay client: simulate, submit, watch for inclusion, resubmit
//!
//! Each attempt targets a later block with freshly built transactions and an escalated
//! priority fee. The first attempt's content hash is the bundle's identity, and exactly
//! one terminal outcome is recorded per identity.

use alloy::primitives::B256;
use chrono::Utc;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::{
    admission::{AdmissionController, AdmissionKey, OperationKind},
    config::{ConfigHandle, RelaySettings},
    errors::{BotError, BotResult},
    network::{retry_with_backoff, ChainStateSource, RetryConfig},
    types::{Bundle, FailureReason, InclusionStatus, RelayInclusion, SubmissionAttempt},
};
use super::{BundleSource, FeeSchedule, PrivateRelay};

pub const RELAY_CALLER: &str = "relay-client";

/// Blocks past a bundle's last target block that its outcome is kept for. Calldata
/// carries the target block as its deadline, so an expired bundle cannot land again.
pub const OUTCOME_RETENTION_BLOCKS: u64 = 256;

#[derive(Debug, Clone)]
pub struct RelayOutcome {
    /// `None` only when no transactions could be built for the first attempt.
    pub bundle: Option<Bundle>,
    pub status: InclusionStatus,
    pub failure: Option<FailureReason>,
    pub included_block: Option<u64>,
}

impl RelayOutcome {
    pub fn attempts(&self) -> u32 {
        self.bundle.as_ref().map(|b| b.attempts()).unwrap_or(0)
    }

    pub fn hash(&self) -> Option<B256> {
        self.bundle.as_ref().map(|b| b.hash)
    }
}

pub struct PrivateRelayClient {
    relay: Arc<dyn PrivateRelay>,
    chain: Arc<dyn ChainStateSource>,
    admission: Arc<AdmissionController>,
    config: ConfigHandle,
    key: AdmissionKey,
    outcomes: DashMap<B256, RelayOutcome>,
}

impl PrivateRelayClient {
    pub fn new(
        relay: Arc<dyn PrivateRelay>,
        chain: Arc<dyn ChainStateSource>,
        admission: Arc<AdmissionController>,
        config: ConfigHandle,
    ) -> Self {
        let key = AdmissionKey::new(relay.endpoint(), RELAY_CALLER);
        Self {
            relay,
            chain,
            admission,
            config,
            key,
            outcomes: DashMap::new(),
        }
    }

    pub fn outcome(&self, hash: &B256) -> Option<RelayOutcome> {
        self.outcomes.get(hash).map(|o| o.clone())
    }

    pub fn recorded_outcomes(&self) -> usize {
        self.outcomes.len()
    }

    /// Drops outcomes whose target range ended more than the retention window before `head`.
    fn prune(&self, head: u64) {
        self.outcomes.retain(|_, outcome| {
            outcome
                .bundle
                .as_ref()
                .is_some_and(|b| b.target_block_range.1.saturating_add(OUTCOME_RETENTION_BLOCKS) >= head)
        });
    }

    pub async fn execute(&self, source: &dyn BundleSource) -> RelayOutcome {
        let settings = self.config.snapshot().config.relay.clone();
        let schedule = FeeSchedule::from(&settings);
        let retry = RetryConfig {
            max_attempts: settings.max_transport_retries,
            ..RetryConfig::default()
        };
        let timing = PollTiming::from(&settings);

        let mut bundle: Option<Bundle> = None;
        let mut previous_priority = None;
        let mut next_target = 0u64;

        for attempt in 0..settings.max_blocks_to_try {
            let head = self.admitted(&retry, "block number", || self.chain.block_number()).await;
            let fee = self.admitted(&retry, "fee estimate", || self.chain.fee_estimate()).await;
            let (head, fee) = match (head, fee) {
                (Ok(h), Ok(f)) => (h, f),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("⚠️ Chain state unavailable for relay attempt: {}", e);
                    return self.finish(bundle, InclusionStatus::Rejected, Some(FailureReason::RelayTimeout), None);
                }
            };

            if attempt == 0 {
                self.prune(head);
            }

            let target = (head + 1).max(next_target);
            next_target = target + 1;
            let pricing = schedule.pricing(attempt, target, &fee, previous_priority);
            previous_priority = Some(pricing.max_priority_fee_per_gas);

            if attempt > 0 && !source.still_profitable(&pricing) {
                info!(target_block = target, "Opportunity no longer profitable at escalated fee, abandoning");
                break;
            }

            let transactions = match source.build(&pricing).await {
                Ok(txs) if !txs.is_empty() => txs,
                Ok(_) => {
                    return self.finish(bundle, InclusionStatus::Rejected, Some(FailureReason::BundleBuildFailed), None);
                }
                Err(e) => {
                    warn!("⚠️ Bundle build failed: {}", e);
                    return self.finish(bundle, InclusionStatus::Rejected, Some(FailureReason::BundleBuildFailed), None);
                }
            };

            let last_block = target + u64::from(settings.max_blocks_to_try.saturating_sub(attempt + 1));
            let current = bundle.get_or_insert_with(|| Bundle::new(transactions.clone(), target, last_block));
            current.transactions = transactions.clone();

            let simulation = match self
                .admitted(&retry, "bundle simulation", || self.relay.simulate(&transactions, target))
                .await
            {
                Ok(sim) => sim,
                Err(e) => {
                    let reason = Self::transport_failure(&e);
                    warn!(bundle = %current.hash, "⚠️ Bundle simulation failed: {}", e);
                    return self.finish(bundle, InclusionStatus::Rejected, Some(reason), None);
                }
            };
            current.simulation_result = Some(simulation.clone());

            if !simulation.success {
                warn!(
                    bundle = %current.hash,
                    revert = simulation.revert_reason.as_deref().unwrap_or("unknown"),
                    "❌ Bundle simulation reverted, not submitting"
                );
                return self.finish(bundle, InclusionStatus::Rejected, Some(FailureReason::SimulationRevert), None);
            }
            if simulation.net_value_wei < settings.min_bundle_value_wei {
                warn!(
                    bundle = %current.hash,
                    value = simulation.net_value_wei,
                    minimum = settings.min_bundle_value_wei,
                    "❌ Bundle value below minimum"
                );
                return self.finish(bundle, InclusionStatus::Rejected, Some(FailureReason::InsufficientBundleValue), None);
            }

            let submission_id = match self
                .admitted(&retry, "bundle submission", || self.relay.submit(&transactions, target))
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    let reason = Self::transport_failure(&e);
                    warn!(bundle = %current.hash, "⚠️ Bundle submission failed: {}", e);
                    return self.finish(bundle, InclusionStatus::Rejected, Some(reason), None);
                }
            };
            current.submission_attempts.push(SubmissionAttempt {
                pricing,
                submission_id: Some(submission_id.clone()),
                simulation: Some(simulation),
                submitted_at: Utc::now(),
            });
            info!(
                bundle = %current.hash,
                attempt = attempt + 1,
                target_block = target,
                priority_fee = pricing.max_priority_fee_per_gas,
                "📤 Bundle submitted"
            );

            match self.await_inclusion(&submission_id, &timing, &retry).await {
                Some(block) => {
                    info!(bundle = %current.hash, block, "✅ Bundle included");
                    return self.finish(bundle, InclusionStatus::Included, None, Some(block));
                }
                None => debug!(bundle = %current.hash, target_block = target, "Bundle not included"),
            }
        }

        self.finish(bundle, InclusionStatus::Stale, Some(FailureReason::NotIncluded), None)
    }

    async fn await_inclusion(&self, submission_id: &str, timing: &PollTiming, retry: &RetryConfig) -> Option<u64> {
        let poll = async {
            loop {
                match self
                    .admitted(retry, "inclusion status", || self.relay.inclusion_status(submission_id))
                    .await
                {
                    Ok(RelayInclusion::Included { block }) => return Some(block),
                    Ok(RelayInclusion::NotIncluded) => return None,
                    Ok(RelayInclusion::Pending) => tokio::time::sleep(timing.interval).await,
                    Err(e) => {
                        warn!("⚠️ Inclusion status unavailable: {}", e);
                        return None;
                    }
                }
            }
        };
        tokio::time::timeout(timing.timeout, poll).await.unwrap_or(None)
    }

    /// Runs `op` behind the admission gate with bounded transport retries.
    async fn admitted<T, F, Fut>(&self, retry: &RetryConfig, context: &str, op: F) -> BotResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BotResult<T>>,
    {
        let op = &op;
        let this = self;
        retry_with_backoff(
            move || async move {
                this.admission.admit(&this.key, OperationKind::Read)?;
                op().await
            },
            retry,
            context,
        )
        .await
    }

    fn transport_failure(error: &BotError) -> FailureReason {
        match error {
            BotError::Relay { .. } => FailureReason::RelayRejected,
            _ => FailureReason::RelayTimeout,
        }
    }

    fn finish(
        &self,
        bundle: Option<Bundle>,
        status: InclusionStatus,
        failure: Option<FailureReason>,
        included_block: Option<u64>,
    ) -> RelayOutcome {
        let mut bundle = bundle;
        if let Some(b) = bundle.as_mut() {
            b.inclusion_status = status;
        }
        let outcome = RelayOutcome {
            bundle,
            status,
            failure,
            included_block,
        };

        let Some(hash) = outcome.hash() else {
            return outcome;
        };
        match self.outcomes.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                warn!(bundle = %hash, "Outcome already recorded for bundle, keeping the first");
                existing.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(outcome.clone());
                outcome
            }
        }
    }
}

struct PollTiming {
    interval: Duration,
    timeout: Duration,
}

impl From<&RelaySettings> for PollTiming {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.block_poll_interval_ms),
            timeout: Duration::from_millis(settings.inclusion_timeout_ms),
        }
    }
}
