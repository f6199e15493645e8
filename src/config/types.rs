use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::sandbox::RunSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StellarConfig {
    pub sandbox: SandboxConfig,
    pub generation: GenerationConfig,
    pub provider: ProviderConfig,
    /// Run table keyed by language identifier
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl Default for StellarConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            generation: GenerationConfig::default(),
            provider: ProviderConfig::default(),
            languages: default_languages(),
        }
    }
}

impl StellarConfig {
    /// Materialize the run table as `RunSpec` values.
    pub fn run_specs(&self) -> Vec<RunSpec> {
        self.languages
            .iter()
            .map(|(language, entry)| RunSpec {
                language: language.clone(),
                sandbox_image: entry.image.clone(),
                entry_file_name: entry.file.clone(),
                run_command: entry.command.clone(),
            })
            .collect()
    }
}

/// One row of the run table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Sandbox image; absent means the language is never executed server-side
    pub image: Option<String>,
    /// Entry file the generated code is written to
    pub file: String,
    /// Command tokens, run through `sh -c` inside the workspace
    pub command: Vec<String>,
}

fn default_languages() -> BTreeMap<String, LanguageConfig> {
    let entry = |image: Option<&str>, file: &str, command: &[&str]| LanguageConfig {
        image: image.map(String::from),
        file: file.to_string(),
        command: command.iter().map(|s| s.to_string()).collect(),
    };

    BTreeMap::from([
        (
            "python".to_string(),
            entry(
                Some("stellar-python-sandbox:3.12"),
                "main.py",
                &["python", "main.py"],
            ),
        ),
        (
            "cpp".to_string(),
            entry(
                Some("stellar-cpp-sandbox:latest"),
                "main.cpp",
                &["g++", "main.cpp", "-o", "main", "&&", "./main"],
            ),
        ),
        (
            "java".to_string(),
            entry(
                Some("stellar-java-sandbox:latest"),
                "Main.java",
                &["javac", "Main.java", "&&", "java", "Main"],
            ),
        ),
        ("html".to_string(), entry(None, "index.html", &[])),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock limit for one execution, in seconds
    pub timeout_seconds: u64,
    /// Directory under which per-run workspaces are created (default: OS temp dir)
    pub scratch_dir: Option<PathBuf>,
    /// Directory uploaded files are resolved from (default: data dir `uploads/`)
    pub upload_dir: Option<PathBuf>,
    /// Docker-specific configuration
    pub docker: DockerConfig,
    /// Local fallback configuration
    pub local: LocalConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            scratch_dir: None,
            upload_dir: None,
            docker: DockerConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

/// Docker-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker CLI binary (default: docker)
    pub binary: String,
    /// Enable networking in ephemeral containers (default: false)
    pub enable_networking: bool,
    /// Directory inside warm instances that receives per-run copies (default: /tmp)
    pub instance_workdir: String,
    /// Limit for auxiliary CLI calls: info, inspect, cleanup (default: 5)
    pub probe_timeout_seconds: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            enable_networking: false,
            instance_workdir: "/tmp".to_string(),
            probe_timeout_seconds: 5,
        }
    }
}

/// Configuration of the non-isolated fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Interpreter invocation per language; the entry file is appended
    pub interpreters: BTreeMap<String, Vec<String>>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            interpreters: BTreeMap::from([("python".to_string(), vec!["python3".to_string()])]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model attempts per request
    pub max_retries: u32,
    /// Run generated code and attach its output to the final event
    pub execute_generated_code: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            execute_generated_code: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key_env: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "gemini".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            model: "gemini-pro".to_string(),
            base_url: None,
        }
    }
}
