use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::sandbox::{ExecutionResult, RunSpec};

/// One execution handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    /// Host directory holding the entry file and any attachment
    pub workspace: &'a Path,
    pub spec: &'a RunSpec,
    pub timeout: Duration,
}

/// Trait for execution backends.
///
/// Both the isolated (container) backend and the local fallback implement
/// this, so the orchestrator can pick one per call without caring which.
/// A program that fails, crashes or times out is still `Ok`; `Err` is
/// reserved for failing to drive the backend itself.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Returns the backend name (e.g., "docker", "local")
    fn name(&self) -> &str;

    /// Whether the backend can accept work right now
    async fn is_available(&self) -> bool;

    /// Run the spec's command against the workspace, bounded by the timeout
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult>;
}

/// State of the isolation daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Up,
    Down,
    NotInstalled,
}

/// Read-only connectivity probes of the isolation layer.
#[async_trait]
pub trait IsolationProbe: Send + Sync {
    async fn daemon_state(&self) -> DaemonState;

    /// Whether the long-lived named instance for `language` exists and runs
    async fn instance_running(&self, language: &str) -> Result<bool>;
}
