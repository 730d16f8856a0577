//! Opportunity scanner

pub mod spread;
pub mod backoff;
pub mod worker;
pub mod scanner;

pub use spread::*;
pub use backoff::*;
pub use worker::*;
pub use scanner::*;
