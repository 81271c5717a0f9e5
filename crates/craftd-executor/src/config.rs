use std::time::Duration;

pub const DEFAULT_IMAGE_REPO: &str = "itzg/minecraft-server";

/// Engine-side settings shared by the provisioner, executor and poller.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Image repository; doubles as the listing filter prefix.
    pub image_repo: String,
    pub log_poll_interval: Duration,
    pub log_tail_lines: usize,
    pub handshake_timeout_secs: u32,
    pub autopause: bool,
    pub command_history: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            image_repo: DEFAULT_IMAGE_REPO.to_string(),
            log_poll_interval: Duration::from_millis(100),
            log_tail_lines: 100,
            handshake_timeout_secs: 180,
            autopause: false,
            command_history: 256,
        }
    }
}
