//! Private relay submission

pub mod transport;
pub mod pricing;
pub mod client;
pub mod flashbots;

pub use transport::*;
pub use pricing::*;
pub use client::*;
pub use flashbots::*;
