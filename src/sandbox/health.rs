use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::sandbox::registry::RunRegistry;
use crate::sandbox::traits::{DaemonState, IsolationProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DaemonStatus {
    #[serde(rename = "running")]
    Up,
    #[serde(rename = "not running")]
    Down,
    #[serde(rename = "not installed")]
    NotInstalled,
}

impl From<DaemonState> for DaemonStatus {
    fn from(state: DaemonState) -> Self {
        match state {
            DaemonState::Up => Self::Up,
            DaemonState::Down => Self::Down,
            DaemonState::NotInstalled => Self::NotInstalled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SandboxStatus {
    #[serde(rename = "running")]
    Up,
    #[serde(rename = "not running")]
    Down,
    #[serde(rename = "error checking")]
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub service: &'static str,
    pub daemon: DaemonStatus,
    pub sandboxes: BTreeMap<String, SandboxStatus>,
    pub checked_at: DateTime<Utc>,
}

/// Reports reachability of the isolation daemon and each named instance.
pub struct HealthReporter {
    registry: Arc<RunRegistry>,
    probe: Arc<dyn IsolationProbe>,
}

impl HealthReporter {
    pub fn new(registry: Arc<RunRegistry>, probe: Arc<dyn IsolationProbe>) -> Self {
        Self { registry, probe }
    }

    pub async fn check(&self) -> HealthReport {
        let daemon = DaemonStatus::from(self.probe.daemon_state().await);

        let mut sandboxes = BTreeMap::new();
        for language in self.registry.executable_languages() {
            let status = match self.probe.instance_running(language).await {
                Ok(true) => SandboxStatus::Up,
                Ok(false) => SandboxStatus::Down,
                Err(e) => {
                    debug!(language = %language, error = %e, "Instance probe failed");
                    SandboxStatus::Error
                }
            };
            sandboxes.insert(language.to_string(), status);
        }

        HealthReport {
            service: "running",
            daemon,
            sandboxes,
            checked_at: Utc::now(),
        }
    }
}
