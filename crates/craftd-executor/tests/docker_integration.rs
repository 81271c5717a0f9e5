//! Lifecycle against a real Docker engine.
//! Run with: cargo test -p craftd-executor --test docker_integration -- --ignored

use craftd_common::{Action, CreationRequest, InstanceStatus};
use craftd_executor::{
    require_docker, ActionExecutor, ContainerRuntime, DockerRuntime, InstanceInspector,
    LifecycleConfig, Provisioner,
};
use std::sync::Arc;

fn runtime() -> Arc<DockerRuntime> {
    Arc::new(DockerRuntime::connect().unwrap())
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_docker_ping_and_list() {
    require_docker!();
    let runtime = runtime();
    runtime.ping().await.unwrap();

    let inspector = InstanceInspector::new(runtime, "itzg/minecraft-server");
    inspector.list().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_docker_create_pause_start_delete() {
    require_docker!();
    let runtime = runtime();
    let config = LifecycleConfig::default();
    let provisioner = Provisioner::new(runtime.clone(), config.clone());
    let executor = ActionExecutor::new(runtime.clone(), &config);

    let request = CreationRequest {
        port: 25899,
        memory_mb: 512,
        ..CreationRequest::new("craftd-it")
    };
    let created = provisioner.create(&request).await.unwrap();
    assert_eq!(created.host_port, Some(25899));

    let paused = executor.apply(&created.id, Action::Pause).await;
    assert!(paused.success, "{}", paused.message);

    // Start on a paused container goes through unpause
    let started = executor.apply(&created.id, Action::Start).await;
    assert!(started.success, "{}", started.message);
    let view = runtime.inspect(&created.id).await.unwrap();
    assert_eq!(view.status, InstanceStatus::Running);

    let deleted = executor.apply(&created.id, Action::Delete).await;
    assert!(deleted.success, "{}", deleted.message);
}
