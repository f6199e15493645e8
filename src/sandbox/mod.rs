mod backends;
mod factory;
mod health;
mod orchestrator;
mod process;
mod registry;
mod traits;
mod uploads;
mod workspace;

use std::time::Duration;

use serde::Serialize;

pub use backends::{DockerBackend, LocalBackend, ISOLATION_NOTICE};
pub use factory::{create_services, create_services_with_uploads, SandboxServices};
pub use health::{DaemonStatus, HealthReport, HealthReporter, SandboxStatus};
pub use orchestrator::{SandboxOrchestrator, DEFAULT_TIMEOUT};
pub use registry::{RunRegistry, RunSpec};
pub use traits::{DaemonState, ExecutionBackend, ExecutionRequest, IsolationProbe};
pub use uploads::{DirectoryUploadStore, UploadStore, UploadedFile};
pub use workspace::Workspace;

/// Stdout returned for languages that are never executed server-side.
pub const NOT_EXECUTED_MESSAGE: &str = "Language not supported for server-side execution.";

/// Result of executing code in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Policy no-op for languages without a sandbox image.
    pub fn not_executed() -> Self {
        Self::new(0, NOT_EXECUTED_MESSAGE, "")
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::new(
            1,
            "",
            format!("Execution timed out after {} seconds.", timeout.as_secs()),
        )
    }

    /// A run that could not be carried out, described on stderr.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(1, "", stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub(crate) fn from_output(output: &std::process::Output) -> Self {
        let mut result = Self {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        // Same 128+N convention the docker CLI uses for killed containers
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = output.status.signal() {
                result.exit_code = 128 + signal;
                if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
                    result.stderr.push('\n');
                }
                result
                    .stderr
                    .push_str(&format!("Terminated by signal {}\n", signal));
            }
        }

        result
    }
}
