//! Agent process supervisor
//!
//! Keeps a single agent child process reachable. `ensure_running` probes the
//! agent's listen address; if nothing answers it spawns the configured
//! command, logs its output line by line, and polls the probe until the
//! startup deadline. A second caller arriving while a start is in flight
//! waits on the same readiness check instead of spawning another child.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, error, info, warn};

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Agent command is empty")]
    EmptyCommand,

    #[error("Failed to spawn agent process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Agent did not become reachable within {0:?}")]
    StartupTimeout(Duration),

    #[error("Agent process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// `host:port` probed for reachability
    pub probe_addr: String,
    pub cwd: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub probe_interval: Duration,
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    /// Build a config from a whitespace-separated command line and the agent
    /// URL it will listen on.
    pub fn from_command_line(command_line: &str, agent_url: &str) -> Option<Self> {
        Some(Self {
            command: command_line.split_whitespace().map(str::to_string).collect(),
            probe_addr: probe_addr_from_url(agent_url)?,
            cwd: None,
            startup_timeout: Duration::from_secs(15),
            probe_interval: Duration::from_millis(250),
            stop_grace: Duration::from_secs(3),
        })
    }
}

/// Derive the `host:port` to probe from a `ws://`/`wss://` agent URL.
pub fn probe_addr_from_url(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    let host = uri.host()?;
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("wss") | Some("https") => 443,
        _ => 80,
    });
    Some(format!("{host}:{port}"))
}

/// Singleton owner of the agent child process.
pub struct AgentSupervisor {
    config: SupervisorConfig,
    child: Mutex<Option<Child>>,
    spawn_count: AtomicU64,
}

impl AgentSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            spawn_count: AtomicU64::new(0),
        }
    }

    /// Number of child processes spawned over this supervisor's lifetime.
    pub fn spawn_count(&self) -> u64 {
        self.spawn_count.load(Ordering::Relaxed)
    }

    /// Lightweight reachability check against the agent's listen address.
    pub async fn is_reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(
                PROBE_CONNECT_TIMEOUT,
                TcpStream::connect(&self.config.probe_addr)
            )
            .await,
            Ok(Ok(_))
        )
    }

    /// Make sure the agent is reachable, spawning it if needed.
    ///
    /// Exhausting the startup wait is fatal for the caller.
    pub async fn ensure_running(&self) -> Result<(), SupervisorError> {
        if self.is_reachable().await {
            return Ok(());
        }

        // Held across spawn and readiness wait; concurrent callers queue here
        // and re-probe once the in-flight start settles.
        let mut slot = self.child.lock().await;
        if self.is_reachable().await {
            return Ok(());
        }

        let still_running = match slot.as_mut() {
            Some(child) => child.try_wait()?.is_none(),
            None => false,
        };

        if !still_running {
            *slot = Some(self.spawn()?);
        } else {
            debug!(
                component = "supervisor",
                event = "agent.start.already_running",
                "Agent process alive but unreachable, waiting for readiness"
            );
        }

        self.wait_until_reachable().await
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or(SupervisorError::EmptyCommand)?;

        info!(
            component = "supervisor",
            event = "agent.spawn",
            program = %program,
            args = ?args,
            probe_addr = %self.config.probe_addr,
            "Spawning agent process"
        );

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(SupervisorError::Spawn)?;
        self.spawn_count.fetch_add(1, Ordering::Relaxed);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(
                        component = "supervisor",
                        event = "agent.stdout",
                        line = %line,
                        "Agent stdout"
                    );
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(
                        component = "supervisor",
                        event = "agent.stderr",
                        line = %line,
                        "Agent stderr"
                    );
                }
            });
        }

        Ok(child)
    }

    async fn wait_until_reachable(&self) -> Result<(), SupervisorError> {
        let deadline = Instant::now() + self.config.startup_timeout;
        loop {
            if self.is_reachable().await {
                info!(
                    component = "supervisor",
                    event = "agent.reachable",
                    probe_addr = %self.config.probe_addr,
                    "Agent is reachable"
                );
                return Ok(());
            }
            if Instant::now() >= deadline {
                error!(
                    component = "supervisor",
                    event = "agent.start.timeout",
                    timeout_ms = self.config.startup_timeout.as_millis() as u64,
                    "Agent did not become reachable"
                );
                return Err(SupervisorError::StartupTimeout(self.config.startup_timeout));
            }
            tokio::time::sleep(self.config.probe_interval).await;
        }
    }

    /// Stop the supervised child: SIGTERM, then a forced kill after the grace
    /// period. No-op when nothing was spawned.
    pub async fn stop(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            // SAFETY: plain signal delivery to a pid we spawned.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                debug!(
                    component = "supervisor",
                    event = "agent.stop.sigterm_failed",
                    pid,
                    "SIGTERM delivery failed"
                );
            }
        }

        match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
            Ok(Ok(status)) => info!(
                component = "supervisor",
                event = "agent.stopped",
                status = %status,
                "Agent process exited"
            ),
            Ok(Err(e)) => warn!(
                component = "supervisor",
                event = "agent.stop.wait_failed",
                error = %e,
                "Waiting for agent exit failed"
            ),
            Err(_) => {
                warn!(
                    component = "supervisor",
                    event = "agent.stop.killed",
                    "Agent ignored SIGTERM, killing"
                );
                let _ = child.kill().await;
            }
        }
    }
}
