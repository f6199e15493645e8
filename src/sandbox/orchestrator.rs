use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::sandbox::registry::{RunRegistry, RunSpec};
use crate::sandbox::traits::{ExecutionBackend, ExecutionRequest};
use crate::sandbox::uploads::{UploadStore, UploadedFile};
use crate::sandbox::workspace::{is_plain_file_name, Workspace};
use crate::sandbox::ExecutionResult;

/// Wall-clock limit applied to every execution unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs code for a language in a fresh workspace.
///
/// Per call: look up the run configuration, materialize a workspace, pick
/// the isolated backend if its daemon answers (local fallback otherwise),
/// execute under the timeout, and remove the workspace. The outcome is
/// always an `ExecutionResult`; nothing here returns an error.
pub struct SandboxOrchestrator {
    registry: Arc<RunRegistry>,
    isolated: Arc<dyn ExecutionBackend>,
    local: Arc<dyn ExecutionBackend>,
    uploads: Arc<dyn UploadStore>,
    scratch_root: PathBuf,
    timeout: Duration,
}

impl SandboxOrchestrator {
    pub fn new(
        registry: Arc<RunRegistry>,
        isolated: Arc<dyn ExecutionBackend>,
        local: Arc<dyn ExecutionBackend>,
        uploads: Arc<dyn UploadStore>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            isolated,
            local,
            uploads,
            scratch_root: scratch_root.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Execute `code` as `language`, optionally alongside an uploaded file.
    pub async fn run(
        &self,
        code: &str,
        language: &str,
        uploaded_file: Option<&UploadedFile>,
    ) -> ExecutionResult {
        let Some(spec) = self
            .registry
            .lookup(language)
            .filter(|spec| spec.is_executable())
        else {
            info!(language = %language, "Language is not executed server-side");
            return ExecutionResult::not_executed();
        };

        let workspace = match Workspace::create(&self.scratch_root).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!(language = %language, error = %e, "Failed to create workspace");
                return ExecutionResult::failure(e.to_string());
            }
        };

        let outcome = AssertUnwindSafe(self.run_in_workspace(&workspace, spec, code, uploaded_file))
            .catch_unwind()
            .await;

        // Removed here on every path, including a panicking backend
        workspace.remove().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(language = %language, reason = %reason, "Execution panicked");
                ExecutionResult::failure(format!("Internal execution error: {}", reason))
            }
        }
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        spec: &RunSpec,
        code: &str,
        uploaded_file: Option<&UploadedFile>,
    ) -> ExecutionResult {
        if let Err(e) = workspace
            .write_file(&spec.entry_file_name, code.as_bytes())
            .await
        {
            error!(error = %e, "Failed to write entry file");
            return ExecutionResult::failure(format!("Failed to prepare workspace: {}", e));
        }

        if let Some(file) = uploaded_file {
            self.attach(workspace, spec, file).await;
        }

        let backend = self.select_backend().await;
        info!(
            language = %spec.language,
            backend = %backend.name(),
            workspace = %workspace.path().display(),
            "Executing code"
        );

        let request = ExecutionRequest {
            workspace: workspace.path(),
            spec,
            timeout: self.timeout,
        };

        match backend.execute(request).await {
            Ok(result) => result,
            Err(e) => {
                error!(backend = %backend.name(), error = %e, "Backend invocation failed");
                ExecutionResult::failure(format!("{} execution error: {}", backend.name(), e))
            }
        }
    }

    /// Pick the backend for this call; daemon availability can change between calls.
    async fn select_backend(&self) -> &dyn ExecutionBackend {
        let available = AssertUnwindSafe(self.isolated.is_available())
            .catch_unwind()
            .await
            .unwrap_or(false);

        if available {
            self.isolated.as_ref()
        } else {
            warn!(
                backend = %self.isolated.name(),
                fallback = %self.local.name(),
                "Isolation backend unavailable, falling back"
            );
            self.local.as_ref()
        }
    }

    /// Copy an uploaded file into the workspace; failures only skip it.
    async fn attach(&self, workspace: &Workspace, spec: &RunSpec, file: &UploadedFile) {
        if !is_plain_file_name(&file.name) || file.name == spec.entry_file_name {
            warn!(name = %file.name, "Skipping attachment with unusable file name");
            return;
        }

        let uploads = Arc::clone(&self.uploads);
        let id = file.id.clone();
        let bytes = match tokio::task::spawn_blocking(move || uploads.resolve(&id)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(id = %file.id, "Uploaded file not found, continuing without it");
                return;
            }
            Err(e) => {
                warn!(id = %file.id, error = %e, "Upload lookup failed, continuing without it");
                return;
            }
        };

        match workspace.write_file(&file.name, &bytes).await {
            Ok(path) => debug!(path = %path.display(), "Attached uploaded file"),
            Err(e) => warn!(name = %file.name, error = %e, "Failed to attach uploaded file"),
        }
    }
}
