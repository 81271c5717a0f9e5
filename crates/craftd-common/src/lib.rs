// Re-export dependencies used in public interfaces of common types

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod action;
pub mod instance;
pub mod request;

pub use action::{Action, ActionOutcome, CommandRecord, CommandState, LogFrame};
pub use instance::{InstanceDescriptor, InstanceStatus, ResourceUsage};
pub use request::{CreationRequest, ProvisioningMode};

#[derive(Error, Debug)]
pub enum CraftdError {
    #[error("Image {image} unavailable: {reason}")]
    ImageUnavailable { image: String, reason: String },

    #[error("Port {port} is already in use by another instance")]
    PortConflict { port: u16 },

    #[error("Failed to provision instance: {0}")]
    ProvisionFailed(String),

    #[error("Action {action} failed on {id}: {cause}")]
    ActionFailed {
        action: &'static str,
        id: String,
        cause: String,
    },

    #[error("Command rejected: {0}")]
    CommandRejected(String),

    #[error("No logs available for {id}: {reason}")]
    LogFetchFailed { id: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl CraftdError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ImageUnavailable { .. } => "IMAGE_UNAVAILABLE",
            Self::PortConflict { .. } => "PORT_CONFLICT",
            Self::ProvisionFailed(_) => "PROVISION_FAILED",
            Self::ActionFailed { .. } => "ACTION_FAILED",
            Self::CommandRejected(_) => "COMMAND_REJECTED",
            Self::LogFetchFailed { .. } => "LOG_FETCH_FAILED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// Define the primary Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, CraftdError>;
