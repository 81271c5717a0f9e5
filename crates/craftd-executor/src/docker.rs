use crate::runtime::{
    split_lines, ContainerRuntime, ContainerSpec, ContainerView, ExecOutput, LogTail,
};
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StatsOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{ContainerStateStatusEnum, HostConfig, PortBinding, PortMap};
use bollard::Docker;
use craftd_common::{InstanceStatus, ResourceUsage};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// [`ContainerRuntime`] over the local Docker engine.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Arc<Docker>,
}

impl DockerRuntime {
    pub fn new(docker: Arc<Docker>) -> Self {
        Self { docker }
    }

    /// Connects through `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(Arc::new(docker)))
    }
}

fn map_status(status: Option<ContainerStateStatusEnum>) -> InstanceStatus {
    match status {
        Some(ContainerStateStatusEnum::RUNNING) => InstanceStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => InstanceStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => InstanceStatus::Restarting,
        Some(ContainerStateStatusEnum::EXITED) => InstanceStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) | Some(ContainerStateStatusEnum::REMOVING) => {
            InstanceStatus::Dead
        }
        Some(ContainerStateStatusEnum::CREATED)
        | Some(ContainerStateStatusEnum::EMPTY)
        | None => InstanceStatus::Created,
    }
}

/// First host port bound in the container's host config.
fn first_host_port(bindings: Option<&PortMap>) -> Option<u16> {
    bindings?
        .values()
        .flatten()
        .flatten()
        .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
}

/// `repo:tag` split on the last colon that is not part of a registry host.
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (reference, "latest"),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn list_containers(&self, image_family: &str) -> Result<Vec<String>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter(|c| {
                c.image
                    .as_deref()
                    .is_some_and(|image| image.starts_with(image_family))
            })
            .filter_map(|c| c.id)
            .collect())
    }

    #[instrument(skip(self))]
    async fn inspect(&self, id: &str) -> Result<ContainerView> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;

        let config = info.config.unwrap_or_default();
        let host_port = first_host_port(
            info.host_config
                .as_ref()
                .and_then(|host| host.port_bindings.as_ref()),
        );

        Ok(ContainerView {
            id: info.id.unwrap_or_else(|| id.to_string()),
            name: info
                .name
                .map(|name| name.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            image: config.image.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
            status: map_status(info.state.and_then(|state| state.status)),
            host_port,
        })
    }

    async fn memory_usage(&self, id: &str) -> Result<Option<ResourceUsage>> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let mut stats = std::pin::pin!(self.docker.stats(id, Some(options)));

        match stats.next().await {
            Some(Ok(snapshot)) => {
                let memory = snapshot.memory_stats;
                Ok(match (memory.usage, memory.limit) {
                    (Some(used), Some(limit)) if limit > 0 => Some(ResourceUsage {
                        memory_used_bytes: used,
                        memory_limit_bytes: limit,
                    }),
                    _ => None,
                })
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn list_image_tags(&self) -> Result<Vec<String>> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;
        Ok(images.into_iter().flat_map(|image| image.repo_tags).collect())
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, reference: &str) -> Result<()> {
        let (repo, tag) = split_reference(reference);
        let options = CreateImageOptions {
            from_image: repo.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let progress: Vec<_> = self
            .docker
            .create_image(Some(options), None, None)
            .try_collect()
            .await?;
        if let Some(error) = progress.into_iter().find_map(|info| info.error) {
            return Err(RuntimeError::Internal(error));
        }
        Ok(())
    }

    #[instrument(
        skip(self, spec),
        fields(name = %spec.name, image = %spec.image, host_port = spec.host_port)
    )]
    async fn create_container(&self, spec: ContainerSpec) -> Result<String> {
        let exposed_ports = HashMap::from([(spec.container_port.clone(), HashMap::new())]);
        let port_bindings: PortMap = HashMap::from([(
            spec.container_port.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        )]);

        let config = Config {
            image: Some(spec.image),
            env: Some(spec.env),
            labels: Some(spec.labels),
            tty: Some(true),
            open_stdin: Some(true),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name,
            ..Default::default()
        };

        let created = self.docker.create_container(Some(options), config).await?;
        for warning in &created.warnings {
            debug!(container_id = %created.id, %warning, "Docker create warning");
        }
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn pause(&self, id: &str) -> Result<()> {
        self.docker.pause_container(id).await?;
        Ok(())
    }

    async fn unpause(&self, id: &str) -> Result<()> {
        self.docker.unpause_container(id).await?;
        Ok(())
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.docker
            .restart_container(id, None::<RestartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn remove_forced(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }

    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>> {
        let tail = match tail {
            LogTail::All => "all".to_string(),
            LogTail::Lines(n) => n.to_string(),
        };
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail,
            ..Default::default()
        };

        let chunks: Vec<_> = self.docker.logs(id, Some(options)).try_collect().await?;
        let raw: String = chunks
            .into_iter()
            .map(|chunk| String::from_utf8_lossy(&chunk.into_bytes()).into_owned())
            .collect();
        Ok(split_lines(&raw))
    }

    #[instrument(skip(self))]
    async fn create_exec(&self, id: &str, argv: Vec<String>) -> Result<String> {
        let options = CreateExecOptions {
            cmd: Some(argv),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            ..Default::default()
        };
        let exec = self.docker.create_exec(id, options).await?;
        Ok(exec.id)
    }

    async fn run_exec(&self, exec_id: &str) -> Result<ExecOutput> {
        let results = self
            .docker
            .start_exec(exec_id, None::<StartExecOptions>)
            .await?;

        let StartExecResults::Attached { mut output, .. } = results else {
            return Ok(ExecOutput::default());
        };

        let mut raw = String::new();
        while let Some(chunk) = output.next().await {
            raw.push_str(&String::from_utf8_lossy(&chunk?.into_bytes()));
        }
        let exit_code = self.docker.inspect_exec(exec_id).await?.exit_code;

        Ok(ExecOutput {
            lines: split_lines(&raw),
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert_eq!(map_status(Some(ContainerStateStatusEnum::RUNNING)), InstanceStatus::Running);
        assert_eq!(map_status(Some(ContainerStateStatusEnum::REMOVING)), InstanceStatus::Dead);
        assert_eq!(map_status(Some(ContainerStateStatusEnum::EMPTY)), InstanceStatus::Created);
        assert_eq!(map_status(None), InstanceStatus::Created);
    }

    #[test]
    fn test_first_host_port() {
        let bindings: PortMap = HashMap::from([(
            "25565/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("25570".to_string()),
            }]),
        )]);
        assert_eq!(first_host_port(Some(&bindings)), Some(25570));
        assert_eq!(first_host_port(None), None);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("itzg/minecraft-server:java17"),
            ("itzg/minecraft-server", "java17")
        );
        assert_eq!(split_reference("registry:5000/mc"), ("registry:5000/mc", "latest"));
        assert_eq!(split_reference("alpine"), ("alpine", "latest"));
    }
}
