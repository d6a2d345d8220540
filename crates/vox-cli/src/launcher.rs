//! Daemon discovery and launch.
//!
//! Before any request the client health-probes the well-known endpoint.
//! If nothing answers it spawns a daemon detached from its own lifetime
//! and polls with exponential backoff until the daemon reports ready. A
//! bound port alone is never trusted; only a passing health check is.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use vox_core::{HealthReport, ServiceState, VoxError, VoxResult, DEFAULT_PORT};

/// Budget for a single health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Total time allowed for a freshly spawned daemon to become ready.
pub const STARTUP_WAIT: Duration = Duration::from_secs(10);

const BACKOFF_START: Duration = Duration::from_millis(50);
const BACKOFF_CAP: Duration = Duration::from_millis(1600);

pub struct Launcher {
    base_url: String,
    startup_wait: Duration,
}

impl Launcher {
    pub fn default_endpoint() -> Self {
        Self::new(format!("http://127.0.0.1:{DEFAULT_PORT}"))
    }

    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            startup_wait: STARTUP_WAIT,
        }
    }

    pub fn with_startup_wait(mut self, wait: Duration) -> Self {
        self.startup_wait = wait;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One short health probe; never spawns anything.
    pub fn probe(&self) -> VoxResult<HealthReport> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(PROBE_TIMEOUT)
            .timeout_read(PROBE_TIMEOUT)
            .build();
        let url = format!("{}/health", self.base_url);
        let response = agent
            .get(&url)
            .call()
            .map_err(|e| VoxError::ConnectionUnavailable {
                endpoint: self.base_url.clone(),
                reason: e.to_string(),
            })?;
        response
            .into_json()
            .map_err(|e| VoxError::stream(format!("malformed health response: {e}")))
    }

    /// Make sure a ready daemon is reachable, spawning one if needed.
    /// Fails with `ConnectionUnavailable` once the startup budget is spent;
    /// there is no further automatic retry beyond that.
    pub fn ensure_running(&self) -> VoxResult<HealthReport> {
        match self.probe() {
            Ok(report) if report.status == ServiceState::Ready => return Ok(report),
            // Starting or draining: someone else owns the port, wait for it.
            Ok(report) => {
                debug!(status = %report.status, "daemon present but not ready, waiting");
            }
            Err(_) => {
                self.spawn_daemon()?;
            }
        }

        let started = Instant::now();
        let deadline = started + self.startup_wait;
        let mut backoff = BACKOFF_START;
        loop {
            std::thread::sleep(backoff);
            if let Ok(report) = self.probe() {
                if report.status == ServiceState::Ready {
                    info!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        "daemon ready"
                    );
                    return Ok(report);
                }
            }
            if Instant::now() >= deadline {
                return Err(VoxError::ConnectionUnavailable {
                    endpoint: self.base_url.clone(),
                    reason: format!("no ready daemon within {:?}", self.startup_wait),
                });
            }
            backoff = (backoff * 2).min(BACKOFF_CAP);
        }
    }

    fn spawn_daemon(&self) -> VoxResult<()> {
        let binary = daemon_binary();
        debug!(binary = %binary.display(), "spawning daemon");
        Command::new(&binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VoxError::ConnectionUnavailable {
                endpoint: self.base_url.clone(),
                reason: format!("failed to spawn {}: {e}", binary.display()),
            })?;
        // The child is never waited on; it outlives this invocation.
        Ok(())
    }
}

/// Resolution order: `VOXD_BIN` override, a `voxd` next to this executable,
/// then `PATH`.
fn daemon_binary() -> PathBuf {
    if let Ok(path) = std::env::var("VOXD_BIN") {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("voxd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("voxd")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port chosen from the dynamic range; nothing listens there in tests.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:59123";

    #[test]
    fn test_probe_dead_endpoint_fails_fast() {
        let launcher = Launcher::new(DEAD_ENDPOINT.to_string());
        let start = Instant::now();
        let err = launcher.probe().unwrap_err();

        assert!(matches!(err, VoxError::ConnectionUnavailable { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_ensure_running_gives_up_within_bound() {
        // Spawn "succeeds" but no daemon ever appears.
        std::env::set_var("VOXD_BIN", "/bin/true");
        let launcher = Launcher::new(DEAD_ENDPOINT.to_string())
            .with_startup_wait(Duration::from_millis(300));

        let start = Instant::now();
        let err = launcher.ensure_running().unwrap_err();
        std::env::remove_var("VOXD_BIN");

        assert!(matches!(err, VoxError::ConnectionUnavailable { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
