//! Outbound request admission

pub mod bucket;
pub mod controller;

pub use bucket::*;
pub use controller::*;
