//! Configuration management for the engine

pub mod settings;
pub mod watchlist;
pub mod handle;

pub use settings::*;
pub use watchlist::*;
pub use handle::*;
