//! Trade execution: settlement dry run, single-flight claims, bundle plans

pub mod settlement;
pub mod inflight;
pub mod bundle;
pub mod coordinator;

pub use settlement::*;
pub use inflight::*;
pub use bundle::*;
pub use coordinator::*;
