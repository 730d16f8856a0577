//! Data persistence and file operations

pub mod opportunities;
pub mod outcomes;

pub use opportunities::*;
pub use outcomes::*;
