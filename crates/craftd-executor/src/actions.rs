//! Lifecycle actions against an existing instance, plus the console
//! command relay.
//!
//! Every runtime failure is wrapped exactly once, here, into
//! `Action <action> failed on <id>: <cause>`. A command is confirmed as soon
//! as its exec session exists; its output lands in the [`CommandLog`] later.

use crate::config::LifecycleConfig;
use crate::runtime::{ContainerRuntime, ExecOutput};
use chrono::Utc;
use craftd_common::{Action, ActionOutcome, CommandRecord, CommandState, CraftdError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Console entry point inside the server image.
pub const CONSOLE_ENTRYPOINT: &str = "rcon-cli";

/// Turns operator input into the exec argv, rejecting blank commands before
/// the runtime is ever contacted.
pub fn parse_console_command(raw: Option<&str>) -> Result<Vec<String>> {
    let text = raw.unwrap_or_default().trim();
    let text = text.strip_prefix('/').unwrap_or(text).trim();
    if text.is_empty() {
        return Err(CraftdError::CommandRejected(
            "command text must not be empty".to_string(),
        ));
    }

    let mut argv = vec![CONSOLE_ENTRYPOINT.to_string()];
    argv.extend(text.split_whitespace().map(str::to_string));
    Ok(argv)
}

/// Bounded record of dispatched commands; the oldest entry is evicted first.
#[derive(Clone)]
pub struct CommandLog {
    records: Arc<DashMap<String, CommandRecord>>,
    capacity: usize,
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, dispatch_id: &str) -> Option<CommandRecord> {
        self.records.get(dispatch_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&self, record: CommandRecord) {
        self.records.insert(record.id.clone(), record);
        while self.records.len() > self.capacity {
            let oldest = self
                .records
                .iter()
                .min_by_key(|entry| entry.dispatched_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.records.remove(&key);
                }
                None => break,
            }
        }
    }

    fn complete(&self, dispatch_id: &str, result: crate::Result<ExecOutput>) {
        let Some(mut record) = self.records.get_mut(dispatch_id) else {
            debug!(%dispatch_id, "Command record evicted before completion");
            return;
        };
        record.finished_at = Some(Utc::now());
        match result {
            Ok(output) => {
                let failed = output.exit_code.is_some_and(|code| code != 0);
                record.state = if failed {
                    CommandState::Failed
                } else {
                    CommandState::Completed
                };
                record.output = output.lines;
                record.exit_code = output.exit_code;
            }
            Err(e) => {
                record.state = CommandState::Failed;
                record.error = Some(e.message());
            }
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    commands: CommandLog,
}

impl ActionExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &LifecycleConfig) -> Self {
        Self {
            runtime,
            commands: CommandLog::new(config.command_history),
        }
    }

    pub fn commands(&self) -> &CommandLog {
        &self.commands
    }

    /// Dispatch record for `dispatch_id`, if it belongs to `instance_id`.
    pub fn command_record(&self, instance_id: &str, dispatch_id: &str) -> Option<CommandRecord> {
        self.commands
            .get(dispatch_id)
            .filter(|record| record.instance_id == instance_id)
    }

    /// Applies `action`; runtime failures come back as `ActionFailed`,
    /// blank commands as `CommandRejected`.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub async fn execute(&self, id: &str, action: Action) -> Result<ActionOutcome> {
        let name = action.name();
        let result = match &action {
            Action::Start => self
                .start(id)
                .await
                .map(|()| ActionOutcome::ok(format!("Instance {id} started"))),
            Action::Pause => self
                .runtime
                .pause(id)
                .await
                .map(|()| ActionOutcome::ok(format!("Instance {id} paused"))),
            Action::Restart => self
                .runtime
                .restart(id)
                .await
                .map(|()| ActionOutcome::ok(format!("Instance {id} restarted"))),
            Action::Delete => self
                .runtime
                .remove_forced(id)
                .await
                .map(|()| ActionOutcome::ok(format!("Instance {id} deleted"))),
            Action::Command { param } => {
                let argv = parse_console_command(param.as_deref())?;
                self.dispatch(id, argv).await
            }
        };

        match result {
            Ok(outcome) => {
                info!(container_id = %id, "{}", outcome.message);
                Ok(outcome)
            }
            Err(e) => {
                warn!(container_id = %id, error = %e, "Action failed");
                Err(CraftdError::ActionFailed {
                    action: name,
                    id: id.to_string(),
                    cause: e.message(),
                })
            }
        }
    }

    /// Like [`execute`](Self::execute) but folds every failure into
    /// `success: false`.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn apply(&self, id: &str, action: Action) -> ActionOutcome {
        match self.execute(id, action).await {
            Ok(outcome) => outcome,
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    async fn start(&self, id: &str) -> crate::Result<()> {
        match self.runtime.start(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_paused_conflict() => {
                debug!(container_id = %id, "Start refused on paused container, unpausing");
                self.runtime.unpause(id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(&self, id: &str, argv: Vec<String>) -> crate::Result<ActionOutcome> {
        let exec_id = self.runtime.create_exec(id, argv.clone()).await?;
        let dispatch_id = Uuid::new_v4().to_string();

        self.commands.insert(CommandRecord {
            id: dispatch_id.clone(),
            instance_id: id.to_string(),
            command: argv,
            state: CommandState::Pending,
            output: Vec::new(),
            exit_code: None,
            error: None,
            dispatched_at: Utc::now(),
            finished_at: None,
        });

        let runtime = self.runtime.clone();
        let commands = self.commands.clone();
        let record_id = dispatch_id.clone();
        tokio::spawn(async move {
            let result = runtime.run_exec(&exec_id).await;
            if let Err(e) = &result {
                warn!(%exec_id, error = %e, "Console command failed");
            }
            commands.complete(&record_id, result);
        });

        Ok(ActionOutcome::dispatched(
            format!("Command dispatched to {id}"),
            dispatch_id,
        ))
    }
}
