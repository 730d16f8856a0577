//! Spread economics and the accept/reject decision

pub mod calculator;
pub mod confidence;
pub mod evaluator;

pub use calculator::*;
pub use confidence::*;
pub use evaluator::*;
