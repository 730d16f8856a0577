//! Price volatility tracking

pub mod tracker;

pub use tracker::*;
