use fleetd_domain::ServiceKind;
use thiserror::Error;

pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Lifecycle misuse and backend failures. None of these are fatal to the
/// daemon; they are reported back to whoever requested the transition.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{service} is already initialised")]
    AlreadyInitialised { service: ServiceKind },
    #[error("{service} is not initialised")]
    NotInitialised { service: ServiceKind },
    #[error("{service} is already running")]
    AlreadyRunning { service: ServiceKind },
    #[error("{service} is not running")]
    NotRunning { service: ServiceKind },
    #[error("{service} has no network configured")]
    NetworkNotSet { service: ServiceKind },
    #[error("failed to start {service}: {reason}")]
    Spawn { service: ServiceKind, reason: String },
    #[error("failed to signal {service}: {reason}")]
    Signal { service: ServiceKind, reason: String },
}

impl SupervisorError {
    /// True for the state-machine misuse variants, as opposed to failures
    /// talking to the OS or the backend.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            SupervisorError::AlreadyInitialised { .. }
                | SupervisorError::NotInitialised { .. }
                | SupervisorError::AlreadyRunning { .. }
                | SupervisorError::NotRunning { .. }
                | SupervisorError::NetworkNotSet { .. }
        )
    }
}
