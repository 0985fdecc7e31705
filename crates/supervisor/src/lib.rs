//! Lifecycle supervision for the daemon's managed services.
//!
//! Every service shares the same [`ServiceState`] machine and differs only in
//! its [`ServiceBackend`]: the ledger and recorder spawn child processes, the
//! peer-map service runs the reporter loop in-process.

pub mod backend;
pub mod error;
pub mod fleet;
pub mod process;
pub mod reporter;
pub mod service;
pub mod state;

pub use backend::{LaunchContext, ServiceBackend};
pub use error::{SupervisorError, SupervisorResult};
pub use fleet::Fleet;
pub use process::ProcessBackend;
pub use reporter::PeerMapBackend;
pub use service::{ManagedService, ServiceStatus, Supervised};
pub use state::ServiceState;
