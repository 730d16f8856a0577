//! Runtime administration

pub mod admin;

pub use admin::*;
