//! Venue quote adapters

pub mod source;
pub mod reserves;
pub mod http;
pub mod factory;

pub use source::*;
pub use reserves::*;
pub use http::*;
pub use factory::*;
