use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, StellarError};
use crate::sandbox::ExecutionResult;

pub(crate) enum ProcessOutcome {
    Completed(ExecutionResult),
    TimedOut,
}

/// Spawn `cmd` in its own process group and wait for it, at most `timeout`.
///
/// On timeout the whole group is killed before returning, so nothing the
/// command forked outlives the call.
pub(crate) async fn run_bounded(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ProcessOutcome> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| StellarError::SandboxExecution(format!("Failed to spawn process: {}", e)))?;
    let pid = child.id();

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    debug!(error = %e, "Child closed stdin early");
                }
            });
        }
    }

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutcome::Completed(ExecutionResult::from_output(
            &output,
        ))),
        Ok(Err(e)) => Err(StellarError::SandboxExecution(format!(
            "Failed to wait for process: {}",
            e
        ))),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Ok(ProcessOutcome::TimedOut)
        }
    }
}

/// Run a short auxiliary command, returning its raw output.
///
/// A command still running after `timeout` is killed with its group and
/// reported as an `ErrorKind::TimedOut` error.
pub(crate) async fn run_quiet(
    mut cmd: Command,
    timeout: Duration,
) -> std::io::Result<std::process::Output> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn()?;
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output,
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no answer within {:?}", timeout),
            ))
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // SAFETY: killpg only delivers a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group already exited
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid = pid, error = %err, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_command_captures_streams() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; exit 3"]);

        match run_bounded(cmd, None, Duration::from_secs(5)).await.unwrap() {
            ProcessOutcome::Completed(result) => {
                assert_eq!(result.exit_code, 3);
                assert_eq!(result.stdout, "out\n");
                assert_eq!(result.stderr, "err\n");
            }
            ProcessOutcome::TimedOut => panic!("command should not time out"),
        }
    }

    #[tokio::test]
    async fn test_stdin_is_delivered() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat"]);

        match run_bounded(cmd, Some(b"piped".to_vec()), Duration::from_secs(5))
            .await
            .unwrap()
        {
            ProcessOutcome::Completed(result) => assert_eq!(result.stdout, "piped"),
            ProcessOutcome::TimedOut => panic!("command should not time out"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_forked_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("(sleep 2; touch {}) & wait", marker.display()));

        let outcome = run_bounded(cmd, None, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::TimedOut));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "background child outlived the timeout");
    }

    #[tokio::test]
    async fn test_quiet_command_gives_up_after_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30"]);

        let started = std::time::Instant::now();
        let err = run_quiet(cmd, Duration::from_millis(300)).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_quiet_command_returns_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo ready"]);

        let output = run_quiet(cmd, Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"ready\n");
    }

    #[tokio::test]
    async fn test_signal_death_is_reported() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "kill -SEGV $$"]);

        match run_bounded(cmd, None, Duration::from_secs(5)).await.unwrap() {
            ProcessOutcome::Completed(result) => {
                assert_eq!(result.exit_code, 128 + 11);
                assert!(result.stderr.ends_with("Terminated by signal 11\n"));
            }
            ProcessOutcome::TimedOut => panic!("command should not time out"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let cmd = Command::new("/nonexistent/stellar-binary");
        let err = run_bounded(cmd, None, Duration::from_secs(1)).await;
        assert!(matches!(err, Err(StellarError::SandboxExecution(_))));
    }
}
