use std::sync::Arc;
use std::time::Duration;

use crate::config::loader::{get_scratch_dir, get_upload_dir};
use crate::config::types::StellarConfig;
use crate::sandbox::backends::{DockerBackend, LocalBackend};
use crate::sandbox::health::HealthReporter;
use crate::sandbox::orchestrator::SandboxOrchestrator;
use crate::sandbox::registry::RunRegistry;
use crate::sandbox::uploads::{DirectoryUploadStore, UploadStore};

/// Process-wide sandbox components, built once from configuration.
pub struct SandboxServices {
    pub registry: Arc<RunRegistry>,
    pub orchestrator: Arc<SandboxOrchestrator>,
    pub health: HealthReporter,
}

/// Build the registry, both backends, the orchestrator and the health reporter.
pub fn create_services(config: &StellarConfig) -> SandboxServices {
    let uploads: Arc<dyn UploadStore> = Arc::new(DirectoryUploadStore::new(get_upload_dir(config)));
    create_services_with_uploads(config, uploads)
}

/// Same as [`create_services`] with a caller-chosen upload store.
pub fn create_services_with_uploads(
    config: &StellarConfig,
    uploads: Arc<dyn UploadStore>,
) -> SandboxServices {
    let registry = Arc::new(RunRegistry::new(config.run_specs()));
    let docker = Arc::new(DockerBackend::new(config.sandbox.docker.clone()));
    let local = Arc::new(LocalBackend::new(config.sandbox.local.clone()));

    let orchestrator = SandboxOrchestrator::new(
        Arc::clone(&registry),
        docker.clone(),
        local,
        uploads,
        get_scratch_dir(config),
    )
    .with_timeout(Duration::from_secs(config.sandbox.timeout_seconds));

    let health = HealthReporter::new(Arc::clone(&registry), docker);

    SandboxServices {
        registry,
        orchestrator: Arc::new(orchestrator),
        health,
    }
}
