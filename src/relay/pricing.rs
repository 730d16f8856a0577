//! Per-attempt fee pricing

use crate::config::RelaySettings;
use crate::network::FeeEstimate;
use crate::types::AttemptPricing;
use crate::utils::bps_of_ceil;

#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    pub escalation_bps: u32,
    pub max_priority_fee_wei: u128,
}

impl From<&RelaySettings> for FeeSchedule {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            escalation_bps: settings.priority_fee_escalation_bps,
            max_priority_fee_wei: settings.max_priority_fee_wei,
        }
    }
}

impl FeeSchedule {
    /// Pricing for `attempt`. The priority fee never drops below the previous attempt's,
    /// grows by the escalation step on every resubmission and is capped.
    pub fn pricing(
        &self,
        attempt: u32,
        target_block: u64,
        fee: &FeeEstimate,
        previous_priority_fee: Option<u128>,
    ) -> AttemptPricing {
        let floor = fee.priority_fee_per_gas.max(1);
        let priority = match previous_priority_fee {
            None => floor,
            Some(previous) => {
                let base = floor.max(previous);
                base.saturating_add(bps_of_ceil(base, self.escalation_bps))
            }
        };
        let priority = match previous_priority_fee {
            // Once at the cap the fee stays there
            Some(previous) => priority.min(self.max_priority_fee_wei).max(previous),
            None => priority.min(self.max_priority_fee_wei),
        };

        AttemptPricing {
            attempt,
            target_block,
            max_fee_per_gas: fee.base_fee_per_gas.saturating_mul(2).saturating_add(priority),
            max_priority_fee_per_gas: priority,
        }
    }
}
