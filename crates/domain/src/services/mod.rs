//! Shared service helpers: account resolution, the account SDK seam and
//! tracing/metrics wiring.

pub mod account;
pub mod sdk;
pub mod telemetry;

pub use account::*;
pub use sdk::*;
pub use telemetry::*;
