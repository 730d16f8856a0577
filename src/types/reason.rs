//! Stable reason codes for rejected opportunities and failed trades

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    StaleQuote,
    NonPositiveProfit,
    BelowMinProfit,
    BelowMinReturn,
    ExceedsLiquidityFraction,
    VolatilityGate,
    CircuitOpen,
    DuplicateInFlight,
    ExposureCap,
    UnprofitableAtExecution,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::StaleQuote => "stale-quote",
            RejectionReason::NonPositiveProfit => "non-positive-profit",
            RejectionReason::BelowMinProfit => "below-min-profit",
            RejectionReason::BelowMinReturn => "below-min-return",
            RejectionReason::ExceedsLiquidityFraction => "exceeds-liquidity-fraction",
            RejectionReason::VolatilityGate => "volatility-gate",
            RejectionReason::CircuitOpen => "circuit-open",
            RejectionReason::DuplicateInFlight => "duplicate-in-flight",
            RejectionReason::ExposureCap => "exposure-cap",
            RejectionReason::UnprofitableAtExecution => "unprofitable-at-execution",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    LoanDrawTimeout,
    LoanDrawFailed,
    FirstLegFailed,
    InsufficientSecondLegOutput,
    RepaymentShortfall,
    SimulationRevert,
    InsufficientBundleValue,
    RelayRejected,
    NotIncluded,
    RelayTimeout,
    BundleBuildFailed,
    ExecutionDeadline,
    ChainUnavailable,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::LoanDrawTimeout => "loan-draw-timeout",
            FailureReason::LoanDrawFailed => "loan-draw-failed",
            FailureReason::FirstLegFailed => "first-leg-failed",
            FailureReason::InsufficientSecondLegOutput => "insufficient-second-leg-output",
            FailureReason::RepaymentShortfall => "repayment-shortfall",
            FailureReason::SimulationRevert => "simulation-revert",
            FailureReason::InsufficientBundleValue => "insufficient-bundle-value",
            FailureReason::RelayRejected => "relay-rejected",
            FailureReason::NotIncluded => "not-included",
            FailureReason::RelayTimeout => "relay-timeout",
            FailureReason::BundleBuildFailed => "bundle-build-failed",
            FailureReason::ExecutionDeadline => "execution-deadline",
            FailureReason::ChainUnavailable => "chain-unavailable",
        }
    }

    /// Whether this failure counts against the circuit breaker's consecutive-failure limit.
    /// Non-inclusion spends nothing, and an unreachable chain says nothing about the trade.
    pub fn is_execution_fault(&self) -> bool {
        !matches!(self, FailureReason::NotIncluded | FailureReason::ChainUnavailable)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
