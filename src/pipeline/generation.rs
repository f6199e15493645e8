use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::StellarError;
use crate::pipeline::events::GenerationEvent;
use crate::providers::ModelProvider;
use crate::sandbox::{ExecutionResult, SandboxOrchestrator, UploadedFile};

/// Model attempts per request unless configured otherwise.
pub const MAX_RETRIES: u32 = 3;

/// One generation request as delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub language: String,
    pub uploaded_file: Option<UploadedFile>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            language: language.into(),
            uploaded_file: None,
        }
    }

    pub fn with_uploaded_file(mut self, file: UploadedFile) -> Self {
        self.uploaded_file = Some(file);
        self
    }

    /// Reason the request cannot enter the pipeline, if any.
    fn rejection(&self) -> Option<&'static str> {
        if self.prompt.trim().is_empty() {
            Some("Prompt is required")
        } else if self.language.trim().is_empty() {
            Some("Language is required")
        } else {
            None
        }
    }
}

/// Drives the model with retries and emits `GenerationEvent`s.
pub struct GenerationPipeline {
    provider: Arc<dyn ModelProvider>,
    orchestrator: Arc<SandboxOrchestrator>,
    max_retries: u32,
    execute_generated_code: bool,
}

impl GenerationPipeline {
    pub fn new(provider: Arc<dyn ModelProvider>, orchestrator: Arc<SandboxOrchestrator>) -> Self {
        Self {
            provider,
            orchestrator,
            max_retries: MAX_RETRIES,
            execute_generated_code: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Run generated code and carry its output in `FinalCode.output`.
    /// Off by default, in which case `output` is always empty.
    pub fn with_execution(mut self, enabled: bool) -> Self {
        self.execute_generated_code = enabled;
        self
    }

    /// Lazily produce the events of one request.
    ///
    /// Every stream ends with exactly one terminal event (`FinalCode` or
    /// `Error`) and yields nothing after it.
    pub fn generate_stream(&self, request: GenerationRequest) -> BoxStream<'static, GenerationEvent> {
        let provider = Arc::clone(&self.provider);
        let orchestrator = Arc::clone(&self.orchestrator);
        let max_retries = self.max_retries;
        let execute = self.execute_generated_code;

        Box::pin(async_stream::stream! {
            if let Some(reason) = request.rejection() {
                warn!(reason = %reason, "Rejecting generation request");
                yield GenerationEvent::error(reason);
                return;
            }

            info!(
                language = %request.language,
                provider = %provider.name(),
                has_file = request.uploaded_file.is_some(),
                "Generation started"
            );

            let prompt = build_prompt(&request.prompt, request.uploaded_file.as_ref());

            for attempt in 1..=max_retries {
                yield GenerationEvent::status(format!(
                    "Attempt {}/{}: Generating code...",
                    attempt, max_retries
                ));

                let outcome = AssertUnwindSafe(provider.generate(&prompt))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(StellarError::Other(anyhow::anyhow!("model client panicked")))
                    });

                match outcome {
                    Ok(code) => {
                        debug!(attempt = attempt, code_len = code.len(), "Model returned code");

                        let output = if execute {
                            let result = orchestrator
                                .run(&code, &request.language, request.uploaded_file.as_ref())
                                .await;
                            format_output(&result)
                        } else {
                            String::new()
                        };

                        yield GenerationEvent::FinalCode { code, output };
                        return;
                    }
                    Err(e) if attempt < max_retries => {
                        warn!(
                            attempt = attempt,
                            model_error = e.is_model_error(),
                            error = %e,
                            "Generation attempt failed"
                        );
                        yield GenerationEvent::status(format!("Attempt failed: {}. Retrying...", e));
                    }
                    Err(e) => {
                        error!(attempts = max_retries, error = %e, "Generation failed");
                        yield GenerationEvent::error(format!("Code generation failed: {}", e));
                        return;
                    }
                }
            }
        })
    }
}

/// Prompt sent to the model; an attached file's content is prepended.
pub fn build_prompt(prompt: &str, uploaded_file: Option<&UploadedFile>) -> String {
    match uploaded_file {
        Some(file) => format!("File content:\n{}\n\nPrompt: {}", file.content, prompt),
        None => prompt.to_string(),
    }
}

fn format_output(result: &ExecutionResult) -> String {
    let output = if result.stderr.is_empty() {
        result.stdout.clone()
    } else {
        format!("stdout:\n{}\nstderr:\n{}", result.stdout, result.stderr)
    };
    format!("Exit code: {}\n{}", result.exit_code, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_with_file() {
        let file = UploadedFile {
            id: "f1".to_string(),
            name: "data.csv".to_string(),
            content: "a,b\n1,2".to_string(),
        };
        assert_eq!(
            build_prompt("sum column b", Some(&file)),
            "File content:\na,b\n1,2\n\nPrompt: sum column b"
        );
        assert_eq!(build_prompt("sum column b", None), "sum column b");
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(
            GenerationRequest::new("", "python").rejection(),
            Some("Prompt is required")
        );
        assert_eq!(
            GenerationRequest::new("print hello", " ").rejection(),
            Some("Language is required")
        );
        assert_eq!(GenerationRequest::new("print hello", "python").rejection(), None);
    }

    #[test]
    fn test_format_output() {
        assert_eq!(
            format_output(&ExecutionResult::new(0, "hello\n", "")),
            "Exit code: 0\nhello\n"
        );
        assert_eq!(
            format_output(&ExecutionResult::new(2, "", "boom")),
            "Exit code: 2\nstdout:\n\nstderr:\nboom"
        );
    }
}
