//! Validation functions for quotes and trade sizing

pub mod price;
pub mod liquidity;

pub use price::*;
pub use liquidity::*;
