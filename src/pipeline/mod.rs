//! Component wiring, event streams and session statistics

pub mod stats;
pub mod fees;
pub mod runner;

pub use stats::*;
pub use fees::*;
pub use runner::*;
