//! FlashGuard - cross-venue DEX arbitrage with flash-loan execution
//!
//! Watches token pairs on pairs of venues, prices each observed spread against gas,
//! flash-loan premium and slippage, and executes accepted trades atomically through a
//! private relay. A circuit breaker, per-pair in-flight registry and admission
//! controller bound what the engine can do when markets or infrastructure misbehave.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod admission;
pub mod quotes;
pub mod scanner;
pub mod arbitrage;
pub mod volatility;
pub mod validation;
pub mod execution;
pub mod relay;
pub mod control;
pub mod pipeline;
pub mod utils;
pub mod storage;

// Re-export commonly used items
pub use config::{Config, ConfigHandle};
pub use errors::{BotError, BotResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
