use bollard::errors::Error as BollardError; // Alias bollard error
use craftd_common::CraftdError;
use thiserror::Error;

// Re-export dependencies potentially needed by consumers (like the gateway)
pub use bollard;
pub use craftd_common as common;

pub mod actions;
pub mod config;
pub mod docker;
pub mod environment;
pub mod image;
pub mod inspect;
pub mod log_tail;
pub mod provisioner;
pub mod runtime;
pub mod test_utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] BollardError),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("No such container: {0}")]
    NotFound(String),
    #[error("Internal runtime error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// The message the runtime itself produced, without our prefixes.
    pub fn message(&self) -> String {
        match self {
            Self::DockerApi(BollardError::DockerResponseServerError { message, .. }) => {
                message.clone()
            }
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DockerApi(BollardError::DockerResponseServerError { status_code, .. }) => {
                Some(*status_code)
            }
            Self::Rejected { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Host port binding collided with one already held on the host.
    pub fn is_port_conflict(&self) -> bool {
        let message = self.message().to_lowercase();
        message.contains("port is already allocated")
            || message.contains("address already in use")
            || (message.contains("bind for") && message.contains("failed"))
    }

    /// Start was refused because the container is paused.
    pub fn is_paused_conflict(&self) -> bool {
        self.status() == Some(409)
            && self
                .message()
                .to_lowercase()
                .contains("cannot start a paused container")
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// Failures with no more specific lifecycle meaning are surfaced as internal errors
impl From<RuntimeError> for CraftdError {
    fn from(err: RuntimeError) -> Self {
        CraftdError::Internal(err.message())
    }
}

// Define local Result using the crate's Error type
pub type Result<T> = std::result::Result<T, RuntimeError>;

pub use actions::{ActionExecutor, CommandLog};
pub use config::LifecycleConfig;
pub use docker::DockerRuntime;
pub use inspect::InstanceInspector;
pub use log_tail::LogTailPoller;
pub use provisioner::Provisioner;
pub use runtime::{ContainerRuntime, ContainerSpec, ContainerView, ExecOutput, LogTail};
