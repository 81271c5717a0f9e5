//! Gates for tests that need a live Docker engine.

use std::path::Path;
use std::process::Command;

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// True when a Docker engine answers on `DOCKER_HOST` or the default socket.
pub fn has_docker() -> bool {
    let endpoint_configured =
        std::env::var_os("DOCKER_HOST").is_some() || Path::new(DEFAULT_SOCKET).exists();
    if !endpoint_configured {
        return false;
    }

    Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Returns early from the calling test when Docker is unavailable.
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::test_utils::has_docker() {
            eprintln!("Skipping: no Docker engine reachable");
            return;
        }
    };
}
