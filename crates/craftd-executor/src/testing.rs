//! In-memory [`ContainerRuntime`] reproducing the Docker behaviour the
//! lifecycle manager depends on: host ports are claimed on start, a paused
//! container refuses `start`, exec needs a running container.

use crate::runtime::{ContainerRuntime, ContainerSpec, ContainerView, ExecOutput, LogTail};
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use craftd_common::{InstanceStatus, ResourceUsage};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    image: String,
    env: Vec<String>,
    status: InstanceStatus,
    host_port: Option<u16>,
    logs: Vec<String>,
}

impl FakeContainer {
    fn holds_port(&self) -> bool {
        matches!(
            self.status,
            InstanceStatus::Running | InstanceStatus::Paused | InstanceStatus::Restarting
        )
    }

    fn view(&self) -> ContainerView {
        ContainerView {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
            env: self.env.clone(),
            status: self.status,
            host_port: self.host_port,
        }
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<BTreeMap<String, FakeContainer>>,
    images: Mutex<HashSet<String>>,
    pulls: Mutex<Vec<String>>,
    pull_failure: Mutex<Option<String>>,
    execs: Mutex<HashMap<String, (String, Vec<String>)>>,
    exec_output: Mutex<ExecOutput>,
    calls: Mutex<Vec<String>>,
    failing_log_fetches: AtomicUsize,
    log_fetches: AtomicUsize,
    create_failure: Mutex<Option<String>>,
    start_failure: Mutex<Option<String>>,
    next_id: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rejected(status: u16, message: impl Into<String>) -> RuntimeError {
    RuntimeError::Rejected {
        status,
        message: message.into(),
    }
}

fn no_such_container(id: &str) -> RuntimeError {
    rejected(404, format!("No such container: {id}"))
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            exec_output: Mutex::new(ExecOutput {
                lines: Vec::new(),
                exit_code: Some(0),
            }),
            ..Default::default()
        }
    }

    pub fn add_image(&self, reference: &str) {
        lock(&self.images).insert(reference.to_string());
    }

    pub fn has_image(&self, reference: &str) -> bool {
        lock(&self.images).contains(reference)
    }

    /// Every pull attempted, successful or not.
    pub fn pulls(&self) -> Vec<String> {
        lock(&self.pulls).clone()
    }

    pub fn fail_pulls(&self, message: &str) {
        *lock(&self.pull_failure) = Some(message.to_string());
    }

    /// Inserts a container directly, bypassing create/start.
    pub fn seed_container(
        &self,
        id: &str,
        image: &str,
        status: InstanceStatus,
        host_port: Option<u16>,
    ) {
        lock(&self.containers).insert(
            id.to_string(),
            FakeContainer {
                id: id.to_string(),
                name: format!("seeded-{id}"),
                image: image.to_string(),
                env: Vec::new(),
                status,
                host_port,
                logs: Vec::new(),
            },
        );
    }

    pub fn status_of(&self, id: &str) -> Option<InstanceStatus> {
        lock(&self.containers).get(id).map(|c| c.status)
    }

    pub fn container_count(&self) -> usize {
        lock(&self.containers).len()
    }

    pub fn push_logs(&self, id: &str, lines: &[&str]) {
        if let Some(container) = lock(&self.containers).get_mut(id) {
            container.logs.extend(lines.iter().map(|l| l.to_string()));
        }
    }

    /// Makes the next `n` log fetches fail.
    pub fn fail_next_log_fetches(&self, n: usize) {
        self.failing_log_fetches.store(n, Ordering::SeqCst);
    }

    /// Log fetches that reached the runtime, failed ones included.
    pub fn log_fetches(&self) -> usize {
        self.log_fetches.load(Ordering::SeqCst)
    }

    /// The next `create_container` fails with a 500 carrying `message`.
    pub fn fail_next_create(&self, message: &str) {
        *lock(&self.create_failure) = Some(message.to_string());
    }

    /// The next `start` fails with a 500 carrying `message`.
    pub fn fail_next_start(&self, message: &str) {
        *lock(&self.start_failure) = Some(message.to_string());
    }

    pub fn set_exec_output(&self, lines: &[&str], exit_code: i64) {
        *lock(&self.exec_output) = ExecOutput {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit_code: Some(exit_code),
        };
    }

    /// Runtime operations in call order, as `"<op>:<id>"`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, op: &str, id: &str) {
        lock(&self.calls).push(format!("{op}:{id}"));
    }

    fn with_container<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut FakeContainer) -> Result<T>,
    ) -> Result<T> {
        let mut containers = lock(&self.containers);
        let container = containers.get_mut(id).ok_or_else(|| no_such_container(id))?;
        f(container)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_containers(&self, image_family: &str) -> Result<Vec<String>> {
        Ok(lock(&self.containers)
            .values()
            .filter(|c| c.image.starts_with(image_family))
            .map(|c| c.id.clone())
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerView> {
        self.with_container(id, |c| Ok(c.view()))
    }

    async fn memory_usage(&self, id: &str) -> Result<Option<ResourceUsage>> {
        self.with_container(id, |c| {
            Ok((c.status == InstanceStatus::Running).then_some(ResourceUsage {
                memory_used_bytes: 512 * 1024 * 1024,
                memory_limit_bytes: 2048 * 1024 * 1024,
            }))
        })
    }

    async fn list_image_tags(&self) -> Result<Vec<String>> {
        Ok(lock(&self.images).iter().cloned().collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        lock(&self.pulls).push(reference.to_string());
        if let Some(message) = lock(&self.pull_failure).clone() {
            return Err(rejected(404, message));
        }
        self.add_image(reference);
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String> {
        if let Some(message) = lock(&self.create_failure).take() {
            return Err(rejected(500, message));
        }
        if !self.has_image(&spec.image) {
            return Err(rejected(404, format!("No such image: {}", spec.image)));
        }

        let mut containers = lock(&self.containers);
        if containers.values().any(|c| c.name == spec.name) {
            return Err(rejected(
                409,
                format!(
                    "Conflict. The container name \"/{}\" is already in use",
                    spec.name
                ),
            ));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{n:012x}fake");
        containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                name: spec.name,
                image: spec.image,
                env: spec.env,
                status: InstanceStatus::Created,
                host_port: Some(spec.host_port),
                logs: Vec::new(),
            },
        );
        drop(containers);

        self.record("create", &id);
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.record("start", id);
        if let Some(message) = lock(&self.start_failure).take() {
            return Err(rejected(500, message));
        }
        let mut containers = lock(&self.containers);
        let container = containers.get(id).ok_or_else(|| no_such_container(id))?;

        match container.status {
            InstanceStatus::Running => return Ok(()),
            InstanceStatus::Paused => {
                return Err(rejected(
                    409,
                    "cannot start a paused container, try unpause instead",
                ))
            }
            _ => {}
        }

        if let Some(port) = container.host_port {
            let name = container.name.clone();
            let taken = containers.values().any(|other| {
                other.id != id && other.holds_port() && other.host_port == Some(port)
            });
            if taken {
                return Err(rejected(
                    500,
                    format!(
                        "driver failed programming external connectivity on endpoint {name}: \
                         Bind for 0.0.0.0:{port} failed: port is already allocated"
                    ),
                ));
            }
        }

        if let Some(container) = containers.get_mut(id) {
            container.status = InstanceStatus::Running;
            container
                .logs
                .push("[init] Starting the Minecraft server...".to_string());
        }
        Ok(())
    }

    async fn pause(&self, id: &str) -> Result<()> {
        self.record("pause", id);
        self.with_container(id, |c| match c.status {
            InstanceStatus::Running => {
                c.status = InstanceStatus::Paused;
                Ok(())
            }
            InstanceStatus::Paused => {
                Err(rejected(409, format!("Container {id} is already paused")))
            }
            _ => Err(rejected(409, format!("Container {id} is not running"))),
        })
    }

    async fn unpause(&self, id: &str) -> Result<()> {
        self.record("unpause", id);
        self.with_container(id, |c| {
            if c.status != InstanceStatus::Paused {
                return Err(rejected(409, format!("Container {id} is not paused")));
            }
            c.status = InstanceStatus::Running;
            Ok(())
        })
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.record("restart", id);
        self.with_container(id, |c| {
            c.status = InstanceStatus::Running;
            c.logs.push("[init] Restarting the Minecraft server...".to_string());
            Ok(())
        })
    }

    async fn remove_forced(&self, id: &str) -> Result<()> {
        self.record("remove", id);
        lock(&self.containers)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| no_such_container(id))
    }

    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>> {
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_log_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_log_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(rejected(500, "log driver unavailable"));
        }

        self.with_container(id, |c| {
            Ok(match tail {
                LogTail::All => c.logs.clone(),
                LogTail::Lines(n) => c.logs[c.logs.len().saturating_sub(n)..].to_vec(),
            })
        })
    }

    async fn create_exec(&self, id: &str, argv: Vec<String>) -> Result<String> {
        self.record("exec", id);
        self.with_container(id, |c| match c.status {
            InstanceStatus::Running => Ok(()),
            InstanceStatus::Paused => Err(rejected(
                409,
                format!("Container {id} is paused, unpause the container before exec"),
            )),
            _ => Err(rejected(409, format!("Container {id} is not running"))),
        })?;

        let exec_id = format!("exec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.execs).insert(exec_id.clone(), (id.to_string(), argv));
        Ok(exec_id)
    }

    async fn run_exec(&self, exec_id: &str) -> Result<ExecOutput> {
        let (container_id, argv) = lock(&self.execs)
            .get(exec_id)
            .cloned()
            .ok_or_else(|| rejected(404, format!("No such exec instance: {exec_id}")))?;

        // The server echoes console commands into its own output
        let echoed = argv.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
        if let Some(container) = lock(&self.containers).get_mut(&container_id) {
            container.logs.push(format!("[Rcon] {echoed}"));
        }

        Ok(lock(&self.exec_output).clone())
    }
}
