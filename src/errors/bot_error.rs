//! Custom error types for the engine

use alloy::primitives::Address;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use crate::types::{NetworkId, TradeState, VenueId};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Unknown network '{network}' referenced by {referenced_by}")]
    UnknownNetwork {
        network: NetworkId,
        referenced_by: String,
    },

    #[error("Malformed watch entry '{id}': {reason}")]
    MalformedWatchEntry { id: String, reason: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Contract interaction failed: {contract} - {message}")]
    Contract {
        contract: Address,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Malformed quote from {venue}: {reason}")]
    MalformedQuote { venue: VenueId, reason: String },

    #[error("Admission denied for {caller} on {endpoint}: {reason}")]
    AdmissionDenied {
        endpoint: String,
        caller: String,
        reason: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Relay error: {message}")]
    Relay {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Signing failed: {message}")]
    Signing { message: String },

    #[error("Trade {trade_id} cannot move from {from} to {to}")]
    InvalidTransition {
        trade_id: Uuid,
        from: TradeState,
        to: TradeState,
    },

    #[error("Circuit breaker active: {reason}")]
    CircuitBreakerOpen {
        reason: String,
        cooldown_remaining: Duration,
    },
}

impl BotError {
    pub fn config(message: impl Into<String>) -> Self {
        BotError::Config { message: message.into() }
    }

    pub fn network(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        BotError::Network {
            message: message.into(),
            source: Some(source.into()),
            retry_count: 0,
        }
    }

    pub fn relay(message: impl Into<String>) -> Self {
        BotError::Relay { message: message.into(), source: None }
    }

    /// Startup errors refuse to run rather than run degraded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::Config { .. } | BotError::UnknownNetwork { .. } | BotError::MalformedWatchEntry { .. }
        )
    }

    /// Transport-level failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BotError::Network { .. } | BotError::Timeout { .. } | BotError::AdmissionDenied { .. }
        )
    }
}

pub type BotResult<T> = Result<T, BotError>;
