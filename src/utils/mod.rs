//! Utility functions and helpers

pub mod clock;
pub mod math;
pub mod logging;
pub mod health;
pub mod display;

pub use clock::*;
pub use math::*;
pub use logging::*;
pub use health::*;
pub use display::*;
