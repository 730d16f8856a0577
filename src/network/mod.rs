//! Network providers, chain state and retry handling

pub mod providers;
pub mod chain;
pub mod retry;

pub use providers::*;
pub use chain::*;
pub use retry::*;
