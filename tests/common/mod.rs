#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use stellar::config::types::LocalConfig;
use stellar::providers::ModelProvider;
use stellar::sandbox::{
    ExecutionBackend, ExecutionRequest, ExecutionResult, LocalBackend, RunRegistry, RunSpec,
    SandboxOrchestrator, UploadStore,
};
use stellar::{Result, StellarError};

/// What a fake backend saw during one `execute` call.
#[derive(Debug, Clone)]
pub struct Observed {
    pub workspace: PathBuf,
    pub files: BTreeMap<String, Vec<u8>>,
    pub timeout: Duration,
}

/// Backend double with a fixed availability and result, recording every call.
pub struct FakeBackend {
    name: &'static str,
    available: bool,
    result: Result<ExecutionResult>,
    pub calls: AtomicUsize,
    pub observed: Mutex<Vec<Observed>>,
}

impl FakeBackend {
    pub fn new(name: &'static str, available: bool, result: ExecutionResult) -> Self {
        Self {
            name,
            available,
            result: Ok(result),
            calls: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, message: &str) -> Self {
        Self {
            name,
            available: true,
            result: Err(StellarError::SandboxExecution(message.to_string())),
            calls: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_observed(&self) -> Observed {
        self.observed.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.observed.lock().unwrap().push(Observed {
            workspace: request.workspace.to_path_buf(),
            files: read_dir_files(request.workspace),
            timeout: request.timeout,
        });
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err(e) => Err(StellarError::SandboxExecution(e.to_string())),
        }
    }
}

/// Backend that panics mid-execution.
pub struct PanickingBackend;

#[async_trait]
impl ExecutionBackend for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, _request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        panic!("backend exploded");
    }
}

/// In-memory upload store.
#[derive(Default)]
pub struct MemoryUploadStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryUploadStore {
    pub fn with(id: &str, bytes: &[u8]) -> Self {
        Self {
            files: HashMap::from([(id.to_string(), bytes.to_vec())]),
        }
    }
}

impl UploadStore for MemoryUploadStore {
    fn resolve(&self, id: &str) -> Option<Vec<u8>> {
        self.files.get(id).cloned()
    }
}

/// Model double returning scripted outcomes in order; `None` = error.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Option<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Option<&str>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(String::from)).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front().flatten();
        next.ok_or(StellarError::ProviderApi {
            message: "model unavailable".to_string(),
            status: Some(503),
        })
    }
}

pub fn spec(language: &str, image: Option<&str>, file: &str, command: &[&str]) -> RunSpec {
    RunSpec {
        language: language.to_string(),
        sandbox_image: image.map(String::from),
        entry_file_name: file.to_string(),
        run_command: command.iter().map(|s| s.to_string()).collect(),
    }
}

/// python, shell (runnable locally through `sh`) and html (never executed).
pub fn test_registry() -> Arc<RunRegistry> {
    Arc::new(RunRegistry::new(vec![
        spec("python", Some("python:3.12"), "main.py", &["python", "main.py"]),
        spec("shell", Some("alpine:3"), "main.sh", &["sh", "main.sh"]),
        spec("html", None, "index.html", &[]),
    ]))
}

pub fn shell_local_backend() -> Arc<LocalBackend> {
    Arc::new(LocalBackend::new(LocalConfig {
        interpreters: BTreeMap::from([("shell".to_string(), vec!["sh".to_string()])]),
    }))
}

pub fn orchestrator(
    scratch: &Path,
    isolated: Arc<dyn ExecutionBackend>,
    local: Arc<dyn ExecutionBackend>,
    uploads: Arc<dyn UploadStore>,
) -> SandboxOrchestrator {
    SandboxOrchestrator::new(test_registry(), isolated, local, uploads, scratch)
}

pub fn read_dir_files(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .map(|entry| {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let bytes = std::fs::read(entry.path()).unwrap_or_default();
                    (name, bytes)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Number of entries left under the scratch root.
pub fn leftover_entries(scratch: &Path) -> usize {
    std::fs::read_dir(scratch).map(|d| d.count()).unwrap_or(0)
}
