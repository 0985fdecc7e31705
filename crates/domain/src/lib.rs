//! Domain-level building blocks shared by the supervisor, reporter, storage
//! and API crates.
//!
//! The crate stays free of process and network I/O: it owns the typed model
//! (networks, service kinds, accounts), the environment contract, the storage
//! traits implemented by `fleetd_storage`, and the account resolution chain
//! that reconciles seed material between the embedded store and the seed file.

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

pub use model::*;
pub use storage::*;
