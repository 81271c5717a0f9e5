use crate::config::LifecycleConfig;
use crate::environment::build_environment;
use crate::image::ImageResolver;
use crate::inspect::InstanceInspector;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::RuntimeError;
use chrono::{DateTime, Utc};
use craftd_common::{CraftdError, CreationRequest, InstanceDescriptor, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Port the game server listens on inside every container.
pub const INTERNAL_PORT: &str = "25565/tcp";

/// Label set on every container this manager creates.
pub const MANAGED_LABEL: &str = "craftd.managed";

/// Creates and starts new instances.
///
/// There is no rollback: if start fails after create, the container stays
/// in whatever state the runtime left it.
#[derive(Clone)]
pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    images: ImageResolver,
    inspector: InstanceInspector,
    config: LifecycleConfig,
}

impl Provisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: LifecycleConfig) -> Self {
        Self {
            images: ImageResolver::new(runtime.clone(), config.image_repo.clone()),
            inspector: InstanceInspector::new(runtime.clone(), config.image_repo.clone()),
            runtime,
            config,
        }
    }

    #[instrument(
        skip(self, request),
        fields(name = %request.name, version = %request.version, port = request.port)
    )]
    pub async fn create(&self, request: &CreationRequest) -> Result<InstanceDescriptor> {
        request.validate()?;

        let image = self.images.ensure(&request.version).await?;
        let env = build_environment(request, &self.config);
        let name = container_name(&request.name, Utc::now());
        let port = request.port;

        let spec = ContainerSpec {
            name: name.clone(),
            image,
            env,
            container_port: INTERNAL_PORT.to_string(),
            host_port: port,
            labels: HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]),
        };

        let container_id = self
            .runtime
            .create_container(spec)
            .await
            .map_err(|e| classify_failure(e, port))?;
        info!(%container_id, %name, "Container created.");

        self.runtime
            .start(&container_id)
            .await
            .map_err(|e| classify_failure(e, port))?;
        info!(%container_id, %name, "Server created and started successfully.");

        self.inspector.describe(&container_id).await
    }
}

fn classify_failure(err: RuntimeError, port: u16) -> CraftdError {
    if err.is_port_conflict() {
        error!(port, error = %err, "Requested host port is already bound");
        CraftdError::PortConflict { port }
    } else {
        error!(error = %err, "Provisioning failed");
        CraftdError::ProvisionFailed(err.message())
    }
}

/// `<slug>-<unix millis>`, unique across retries of the same request.
pub fn container_name(name: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", slug(name), now.timestamp_millis())
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .trim_end_matches('-');
    if trimmed.is_empty() {
        "server".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_container_name_appends_timestamp() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(container_name("Lobby", now), "lobby-1700000000123");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("My Cool  Server!"), "my-cool-server");
        assert_eq!(slug("_hidden"), "hidden");
        assert_eq!(slug("v1.2_test"), "v1.2_test");
        assert_eq!(slug("!!!"), "server");
        assert_eq!(slug("Überwelt"), "berwelt");
    }
}
