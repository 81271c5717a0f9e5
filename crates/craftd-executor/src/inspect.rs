use crate::runtime::{ContainerRuntime, ContainerView};
use craftd_common::{CraftdError, InstanceDescriptor, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds live descriptors straight from the runtime. Holds no state.
#[derive(Clone)]
pub struct InstanceInspector {
    runtime: Arc<dyn ContainerRuntime>,
    image_family: String,
}

impl InstanceInspector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, image_family: impl Into<String>) -> Self {
        Self {
            runtime,
            image_family: image_family.into(),
        }
    }

    /// Every managed instance, with a memory snapshot where available.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<InstanceDescriptor>> {
        let ids = self
            .runtime
            .list_containers(&self.image_family)
            .await
            .map_err(|e| {
                CraftdError::Internal(format!("Failed to retrieve servers: {}", e.message()))
            })?;

        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            match self.describe(&id).await {
                Ok(descriptor) => instances.push(descriptor),
                // Removed between list and inspect
                Err(CraftdError::NotFound(_)) => {
                    debug!(container_id = %id, "Container vanished")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(instances)
    }

    #[instrument(skip(self))]
    pub async fn describe(&self, id: &str) -> Result<InstanceDescriptor> {
        let view = self.runtime.inspect(id).await.map_err(|e| {
            if e.is_not_found() {
                CraftdError::NotFound(id.to_string())
            } else {
                CraftdError::from(e)
            }
        })?;

        let resources = match self.runtime.memory_usage(&view.id).await {
            Ok(usage) => usage,
            Err(e) => {
                debug!(container_id = %view.id, error = %e, "Memory snapshot unavailable");
                None
            }
        };

        Ok(into_descriptor(view, resources))
    }
}

fn into_descriptor(
    view: ContainerView,
    resources: Option<craftd_common::ResourceUsage>,
) -> InstanceDescriptor {
    InstanceDescriptor {
        id: view.id,
        name: view.name,
        image: view.image,
        env: view.env,
        status: view.status,
        host_port: view.host_port,
        resources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;
    use craftd_common::InstanceStatus;

    const JAVA17: &str = "itzg/minecraft-server:java17";

    #[tokio::test]
    async fn test_list_filters_to_image_family() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.seed_container("a", JAVA17, InstanceStatus::Running, Some(25565));
        runtime.seed_container("b", "postgres:16", InstanceStatus::Running, None);
        runtime.seed_container(
            "c",
            "itzg/minecraft-server:java8",
            InstanceStatus::Exited,
            Some(25566),
        );

        let inspector = InstanceInspector::new(runtime, "itzg/minecraft-server");
        let mut ids: Vec<_> = inspector
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_running_instances_carry_memory_snapshot() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.seed_container("a", JAVA17, InstanceStatus::Running, Some(25565));
        runtime.seed_container("b", JAVA17, InstanceStatus::Exited, Some(25566));

        let inspector = InstanceInspector::new(runtime, "itzg/minecraft-server");

        assert!(inspector.describe("a").await.unwrap().resources.is_some());
        assert!(inspector.describe("b").await.unwrap().resources.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let runtime = Arc::new(FakeRuntime::new());
        let inspector = InstanceInspector::new(runtime, "itzg/minecraft-server");

        assert!(matches!(
            inspector.describe("missing").await,
            Err(CraftdError::NotFound(id)) if id == "missing"
        ));
    }
}
