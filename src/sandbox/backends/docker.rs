use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::types::DockerConfig;
use crate::error::{Result, StellarError};
use crate::sandbox::process::{run_bounded, run_quiet, ProcessOutcome};
use crate::sandbox::traits::{DaemonState, ExecutionBackend, ExecutionRequest, IsolationProbe};
use crate::sandbox::ExecutionResult;

/// Mount point of the workspace inside ephemeral containers
const CONTAINER_WORKDIR: &str = "/app";

/// Exit status of a command killed with SIGKILL
const SIGKILL_EXIT_CODE: i32 = 128 + 9;

/// A SIGKILL this close to the deadline came from the in-instance `timeout`
const DEADLINE_SLACK: Duration = Duration::from_millis(500);

/// Docker execution backend.
///
/// Uses the Docker CLI. Two tiers:
/// - Warm: a long-lived container named `<language>-sandbox` is running; the
///   workspace is copied into a private directory inside it and the command
///   runs via `docker exec`.
/// - Ephemeral: a fresh `docker run --rm` container with the workspace
///   bind-mounted at `/app`.
///
/// Anything that goes wrong before the warm command starts falls through to
/// the ephemeral tier. Both tiers draw on one deadline per execution, and
/// every auxiliary CLI call is bounded by the probe timeout.
pub struct DockerBackend {
    binary: String,
    enable_networking: bool,
    instance_workdir: String,
    probe_timeout: Duration,
}

impl DockerBackend {
    pub fn new(config: DockerConfig) -> Self {
        Self {
            binary: config.binary,
            enable_networking: config.enable_networking,
            instance_workdir: config.instance_workdir,
            probe_timeout: Duration::from_secs(config.probe_timeout_seconds.max(1)),
        }
    }

    /// Name of the long-lived instance for a language.
    pub fn instance_name(language: &str) -> String {
        format!("{}-sandbox", language)
    }

    fn docker(&self) -> Command {
        Command::new(&self.binary)
    }

    /// Check whether a named container exists and is running.
    async fn inspect_running(&self, name: &str) -> Result<bool> {
        let mut cmd = self.docker();
        cmd.args(["inspect", "--format={{.State.Running}}", name]);

        let output = run_quiet(cmd, self.probe_timeout).await.map_err(|e| {
            StellarError::SandboxExecution(format!("Failed to run docker inspect: {}", e))
        })?;

        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).contains("true"))
    }

    /// Execute inside a running named instance.
    async fn execute_in_instance(
        &self,
        instance: &str,
        request: ExecutionRequest<'_>,
        deadline: Instant,
    ) -> Result<ExecutionResult> {
        let target = format!(
            "{}/{}",
            self.instance_workdir.trim_end_matches('/'),
            workspace_name(request.workspace)
        );

        if let Err(e) = self
            .copy_into_instance(instance, request.workspace, &target, deadline)
            .await
        {
            self.remove_from_instance(instance, &target);
            return Err(e);
        }

        let Some(remaining) = time_left(deadline) else {
            self.remove_from_instance(instance, &target);
            return Ok(ExecutionResult::timed_out(request.timeout));
        };

        debug!(instance = %instance, target = %target, "Executing via docker exec");

        let mut cmd = self.docker();
        cmd.args(["exec", "-i", "-w", target.as_str(), instance]);
        // In-container deadline; killing the docker client alone would leave the program running
        cmd.args(["timeout", "-s", "KILL"]);
        cmd.arg(whole_seconds(remaining).to_string());
        cmd.args(["sh", "-c", request.spec.shell_command().as_str()]);

        let outcome = run_bounded(cmd, None, remaining).await;

        self.remove_from_instance(instance, &target);

        let result = match outcome? {
            ProcessOutcome::Completed(result)
                if result.exit_code == SIGKILL_EXIT_CODE
                    && time_left(deadline).map_or(true, |left| left < DEADLINE_SLACK) =>
            {
                ExecutionResult::timed_out(request.timeout)
            }
            ProcessOutcome::Completed(result) => result,
            ProcessOutcome::TimedOut => ExecutionResult::timed_out(request.timeout),
        };

        debug!(
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed (warm instance)"
        );

        Ok(result)
    }

    /// Stream the workspace as a tar archive into `target` inside the instance.
    async fn copy_into_instance(
        &self,
        instance: &str,
        workspace: &Path,
        target: &str,
        deadline: Instant,
    ) -> Result<()> {
        let root = workspace.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut builder = tar::Builder::new(Vec::new());
            builder.append_dir_all(".", &root)?;
            builder.into_inner()
        })
        .await
        .map_err(|e| StellarError::SandboxExecution(format!("Archive task failed: {}", e)))??;

        let remaining = time_left(deadline).ok_or_else(|| {
            StellarError::SandboxExecution(format!("No time left to copy into {}", instance))
        })?;

        let quoted = shell_quote(target);
        let mut cmd = self.docker();
        cmd.args(["exec", "-i", instance, "sh", "-c"]);
        cmd.arg(format!("mkdir -p {0} && tar -x -C {0}", quoted));

        match run_bounded(cmd, Some(archive), remaining).await? {
            ProcessOutcome::Completed(result) if result.success() => Ok(()),
            ProcessOutcome::Completed(result) => Err(StellarError::SandboxExecution(format!(
                "Failed to copy workspace into {}: {}",
                instance,
                result.stderr.trim()
            ))),
            ProcessOutcome::TimedOut => Err(StellarError::SandboxExecution(format!(
                "Timed out copying workspace into {}",
                instance
            ))),
        }
    }

    /// Remove a per-run directory inside the instance in the background.
    fn remove_from_instance(&self, instance: &str, target: &str) {
        let mut cmd = self.docker();
        cmd.args(["exec", instance, "rm", "-rf", target]);
        let instance = instance.to_string();
        let limit = self.probe_timeout;

        tokio::spawn(async move {
            match run_quiet(cmd, limit).await {
                Ok(output) if output.status.success() => {}
                Ok(output) => warn!(
                    instance = %instance,
                    error = %String::from_utf8_lossy(&output.stderr),
                    "Failed to clean up instance directory"
                ),
                Err(e) => {
                    warn!(instance = %instance, error = %e, "Failed to clean up instance directory")
                }
            }
        });
    }

    /// Execute in a fresh auto-removing container.
    async fn execute_ephemeral(
        &self,
        image: &str,
        request: ExecutionRequest<'_>,
        deadline: Instant,
    ) -> Result<ExecutionResult> {
        let Some(remaining) = time_left(deadline) else {
            return Ok(ExecutionResult::timed_out(request.timeout));
        };

        let container = workspace_name(request.workspace);
        let host_dir = tokio::fs::canonicalize(request.workspace).await?;

        let mut cmd = self.docker();
        cmd.args(["run", "--rm", "--name", container.as_str()]);

        // Network isolation
        if !self.enable_networking {
            cmd.arg("--network=none");
        }

        cmd.arg("-v");
        cmd.arg(format!("{}:{}", host_dir.display(), CONTAINER_WORKDIR));
        cmd.args(["-w", CONTAINER_WORKDIR]);

        cmd.arg(image);
        cmd.args(["sh", "-c", request.spec.shell_command().as_str()]);

        debug!(container = %container, image = %image, "Executing via docker run");

        let result = match run_bounded(cmd, None, remaining).await? {
            ProcessOutcome::Completed(result) => result,
            ProcessOutcome::TimedOut => {
                self.force_remove_container(&container);
                ExecutionResult::timed_out(request.timeout)
            }
        };

        debug!(
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed (ephemeral)"
        );

        Ok(result)
    }

    /// Kill and remove a container; the killed client does not stop it.
    fn force_remove_container(&self, container: &str) {
        let mut cmd = self.docker();
        cmd.args(["rm", "-f", container]);
        let container = container.to_string();
        let limit = self.probe_timeout;

        tokio::spawn(async move {
            match run_quiet(cmd, limit).await {
                Ok(output) if output.status.success() => {
                    info!(container = %container, "Removed timed-out container")
                }
                Ok(output) => warn!(
                    container = %container,
                    error = %String::from_utf8_lossy(&output.stderr),
                    "Failed to remove timed-out container"
                ),
                Err(e) => {
                    warn!(container = %container, error = %e, "Failed to remove timed-out container")
                }
            }
        });
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    async fn is_available(&self) -> bool {
        self.daemon_state().await == DaemonState::Up
    }

    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        let deadline = Instant::now() + request.timeout;

        let language = &request.spec.language;
        let image = request.spec.sandbox_image.as_deref().ok_or_else(|| {
            StellarError::SandboxExecution(format!("No sandbox image configured for {}", language))
        })?;

        let instance = Self::instance_name(language);
        match self.inspect_running(&instance).await {
            Ok(true) => match self.execute_in_instance(&instance, request, deadline).await {
                Ok(result) => return Ok(result),
                Err(e) => warn!(
                    instance = %instance,
                    error = %e,
                    "Warm instance unusable, starting an ephemeral container"
                ),
            },
            Ok(false) => debug!(instance = %instance, "No running instance"),
            Err(e) => debug!(instance = %instance, error = %e, "Instance probe failed"),
        }

        self.execute_ephemeral(image, request, deadline).await
    }
}

#[async_trait]
impl IsolationProbe for DockerBackend {
    async fn daemon_state(&self) -> DaemonState {
        let mut cmd = self.docker();
        cmd.arg("info");

        match run_quiet(cmd, self.probe_timeout).await {
            Ok(output) if output.status.success() => DaemonState::Up,
            Ok(_) => DaemonState::Down,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DaemonState::NotInstalled,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                warn!(error = %e, "docker info did not answer");
                DaemonState::Down
            }
            Err(e) => {
                debug!(error = %e, "docker info failed");
                DaemonState::Down
            }
        }
    }

    async fn instance_running(&self, language: &str) -> Result<bool> {
        self.inspect_running(&Self::instance_name(language)).await
    }
}

/// Time before `deadline`, `None` once it has passed.
fn time_left(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

/// Whole seconds for `timeout(1)`, rounded up.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

fn workspace_name(workspace: &Path) -> String {
    workspace
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("stellar-run-{}", uuid::Uuid::new_v4()))
}

/// Single-quote a string for `sh -c`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}
