//! The seam between the lifecycle manager and the container engine.
//!
//! Everything the manager knows about an instance comes through this trait;
//! nothing is cached on our side. `DockerRuntime` is the production
//! implementation, `testing::FakeRuntime` the in-memory one.

use crate::Result;
use async_trait::async_trait;
use craftd_common::{InstanceStatus, ResourceUsage};
use std::collections::HashMap;

/// How much of an instance's output to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    /// Entire backlog.
    All,
    /// Only the most recent `n` lines.
    Lines(usize),
}

/// Everything needed to create one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    /// Port inside the container, e.g. `25565/tcp`.
    pub container_port: String,
    pub host_port: u16,
    pub labels: HashMap<String, String>,
}

/// The runtime's inspected view of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub status: InstanceStatus,
    pub host_port: Option<u16>,
}

/// Captured result of a finished exec session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub lines: Vec<String>,
    pub exit_code: Option<i64>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Ids of all containers (any state) whose image belongs to `image_family`.
    async fn list_containers(&self, image_family: &str) -> Result<Vec<String>>;

    async fn inspect(&self, id: &str) -> Result<ContainerView>;

    /// One-shot memory snapshot; `None` when the container is not running.
    async fn memory_usage(&self, id: &str) -> Result<Option<ResourceUsage>>;

    /// `repo:tag` references of every locally available image.
    async fn list_image_tags(&self) -> Result<Vec<String>>;

    /// Pulls `reference`, returning once the pull completed or failed.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    async fn create_container(&self, spec: ContainerSpec) -> Result<String>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn pause(&self, id: &str) -> Result<()>;

    async fn unpause(&self, id: &str) -> Result<()>;

    async fn restart(&self, id: &str) -> Result<()>;

    async fn remove_forced(&self, id: &str) -> Result<()>;

    /// Combined stdout/stderr, one entry per line.
    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>>;

    /// Registers an exec session inside a running container.
    async fn create_exec(&self, id: &str, argv: Vec<String>) -> Result<String>;

    /// Runs a registered exec session to completion, capturing its output.
    async fn run_exec(&self, exec_id: &str) -> Result<ExecOutput>;
}

/// Splits raw output chunks into lines, dropping carriage returns and the
/// empty remainder after a trailing newline.
pub fn split_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        assert_eq!(
            split_lines("a\r\nb\n\nc\n\n"),
            vec!["a".to_string(), "b".to_string(), String::new(), "c".to_string()]
        );
        assert!(split_lines("").is_empty());
    }
}
