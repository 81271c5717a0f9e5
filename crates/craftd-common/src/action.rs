use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /servers/{id}/action`.
///
/// Wire form is `{"action": "<name>"}`, with `"param"` carrying the console
/// text for `command`. Unknown action names fail deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Start,
    Pause,
    Restart,
    Delete,
    Command {
        #[serde(default, alias = "parameter")]
        param: Option<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Restart => "restart",
            Self::Delete => "delete",
            Self::Command { .. } => "command",
        }
    }
}

/// Result of a lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    /// Set for `command`: poll `/servers/{id}/commands/{dispatch_id}` for the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<String>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            dispatch_id: None,
        }
    }

    pub fn dispatched(message: impl Into<String>, dispatch_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            dispatch_id: Some(dispatch_id.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            dispatch_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandState {
    Pending,
    Completed,
    Failed,
}

/// Deferred result of a dispatched console command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: String,
    pub instance_id: String,
    pub command: Vec<String>,
    pub state: CommandState,
    pub output: Vec<String>,
    pub exit_code: Option<i64>,
    pub error: Option<String>,
    pub dispatched_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One server-sent frame of the log tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFrame {
    pub data: Vec<String>,
    pub index: u64,
}
