//! Core data types and structures

pub mod quote;
pub mod opportunity;
pub mod trade;
pub mod bundle;
pub mod reason;
pub mod health;

pub use quote::*;
pub use opportunity::*;
pub use trade::*;
pub use bundle::*;
pub use reason::*;
pub use health::*;
