//! Relay bundle records

use alloy::primitives::{keccak256, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InclusionStatus {
    Pending,
    Included,
    Stale,
    Rejected,
}

/// What the relay reports for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayInclusion {
    Pending,
    Included { block: u64 },
    NotIncluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    pub success: bool,
    pub gas_used: u64,
    /// Value paid to the block builder plus searcher proceeds, in wei.
    pub net_value_wei: u128,
    pub revert_reason: Option<String>,
}

/// Fee pricing of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptPricing {
    pub attempt: u32,
    pub target_block: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionAttempt {
    pub pricing: AttemptPricing,
    pub submission_id: Option<String>,
    pub simulation: Option<SimulationResult>,
    pub submitted_at: DateTime<Utc>,
}

/// Ordered transactions submitted as a unit. The content hash of the first signed
/// payload is the bundle's identity; later attempts are recorded, not re-identified.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub hash: B256,
    pub transactions: Vec<Bytes>,
    pub target_block_range: (u64, u64),
    pub simulation_result: Option<SimulationResult>,
    pub submission_attempts: Vec<SubmissionAttempt>,
    pub inclusion_status: InclusionStatus,
}

impl Bundle {
    pub fn new(transactions: Vec<Bytes>, first_block: u64, last_block: u64) -> Self {
        Self {
            hash: content_hash(&transactions),
            transactions,
            target_block_range: (first_block, last_block),
            simulation_result: None,
            submission_attempts: Vec::new(),
            inclusion_status: InclusionStatus::Pending,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.submission_attempts.len() as u32
    }
}

pub fn content_hash(transactions: &[Bytes]) -> B256 {
    let mut buf = Vec::with_capacity(transactions.iter().map(|t| t.len()).sum());
    for tx in transactions {
        buf.extend_from_slice(keccak256(tx).as_slice());
    }
    keccak256(buf)
}
