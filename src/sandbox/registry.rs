use std::collections::HashMap;

/// How to execute code for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub language: String,
    /// `None` marks a language that is never executed server-side
    pub sandbox_image: Option<String>,
    pub entry_file_name: String,
    pub run_command: Vec<String>,
}

impl RunSpec {
    /// Whether this language may be run by a backend at all.
    pub fn is_executable(&self) -> bool {
        self.sandbox_image.is_some() && !self.run_command.is_empty()
    }

    /// Command tokens joined for `sh -c`, so shell operators such as `&&` apply.
    pub fn shell_command(&self) -> String {
        self.run_command.join(" ")
    }
}

/// Read-only table of run configurations, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    specs: HashMap<String, RunSpec>,
}

impl RunRegistry {
    pub fn new(specs: impl IntoIterator<Item = RunSpec>) -> Self {
        Self {
            specs: specs
                .into_iter()
                .map(|spec| (spec.language.clone(), spec))
                .collect(),
        }
    }

    /// Look up the run configuration for a language; `None` means unrecognized.
    pub fn lookup(&self, language: &str) -> Option<&RunSpec> {
        self.specs.get(language)
    }

    /// Languages that have a sandbox image, sorted.
    pub fn executable_languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self
            .specs
            .values()
            .filter(|spec| spec.sandbox_image.is_some())
            .map(|spec| spec.language.as_str())
            .collect();
        languages.sort_unstable();
        languages
    }

    /// All entries, sorted by language.
    pub fn specs(&self) -> Vec<&RunSpec> {
        let mut specs: Vec<&RunSpec> = self.specs.values().collect();
        specs.sort_by(|a, b| a.language.cmp(&b.language));
        specs
    }
}
