use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::types::LocalConfig;
use crate::error::{Result, StellarError};
use crate::sandbox::process::{run_bounded, ProcessOutcome};
use crate::sandbox::traits::{ExecutionBackend, ExecutionRequest};
use crate::sandbox::ExecutionResult;

/// Prepended to stderr of every local run.
pub const ISOLATION_NOTICE: &str =
    "[stellar] isolation backend unavailable: code ran on the host without sandboxing\n";

/// Degraded backend that runs code directly on the host.
///
/// Only languages with a configured interpreter are supported. There is no
/// filesystem or process containment; only the timeout still applies.
pub struct LocalBackend {
    interpreters: BTreeMap<String, Vec<String>>,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            interpreters: config.interpreters,
        }
    }

    pub fn supports(&self, language: &str) -> bool {
        self.interpreters.contains_key(language)
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        let language = &request.spec.language;

        let Some(invocation) = self.interpreters.get(language) else {
            return Ok(ExecutionResult::failure(format!(
                "Local execution not supported for {}",
                language
            )));
        };

        let (program, args) = invocation.split_first().ok_or_else(|| {
            StellarError::Config(format!("Empty local interpreter for {}", language))
        })?;

        warn!(
            language = %language,
            "Running generated code on the host without sandbox isolation"
        );

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.arg(&request.spec.entry_file_name);
        cmd.current_dir(request.workspace);

        match run_bounded(cmd, None, request.timeout).await? {
            ProcessOutcome::Completed(mut result) => {
                debug!(
                    exit_code = result.exit_code,
                    stdout_len = result.stdout.len(),
                    stderr_len = result.stderr.len(),
                    "Command completed (local)"
                );
                result.stderr.insert_str(0, ISOLATION_NOTICE);
                Ok(result)
            }
            ProcessOutcome::TimedOut => Ok(ExecutionResult::timed_out(request.timeout)),
        }
    }
}
