mod common;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use common::*;
use stellar::pipeline::{GenerationEvent, GenerationPipeline, GenerationRequest};
use stellar::providers::ModelProvider;
use stellar::sandbox::{ExecutionResult, SandboxOrchestrator, UploadedFile};
use stellar::Result;

struct Harness {
    _scratch: tempfile::TempDir,
    provider: Arc<ScriptedProvider>,
    isolated: Arc<FakeBackend>,
    orchestrator: Arc<SandboxOrchestrator>,
}

fn harness(script: Vec<Option<&str>>, run_result: ExecutionResult) -> Harness {
    let scratch = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new(script));
    let isolated = Arc::new(FakeBackend::new("docker", true, run_result));
    let local = Arc::new(FakeBackend::new("local", true, ExecutionResult::new(0, "", "")));
    let orchestrator = Arc::new(orchestrator(
        scratch.path(),
        isolated.clone(),
        local,
        Arc::new(MemoryUploadStore::default()),
    ));
    Harness {
        _scratch: scratch,
        provider,
        isolated,
        orchestrator,
    }
}

impl Harness {
    fn pipeline(&self) -> GenerationPipeline {
        GenerationPipeline::new(self.provider.clone(), self.orchestrator.clone())
    }
}

async fn collect(pipeline: &GenerationPipeline, request: GenerationRequest) -> Vec<GenerationEvent> {
    pipeline.generate_stream(request).collect().await
}

fn status(message: &str) -> GenerationEvent {
    GenerationEvent::status(message)
}

fn assert_single_terminal_last(events: &[GenerationEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "events: {:?}", events);
    assert!(events.last().map(|e| e.is_terminal()).unwrap_or(false));
}

#[tokio::test]
async fn first_attempt_success() {
    let h = harness(vec![Some("print('hi')")], ExecutionResult::new(0, "", ""));
    let events = collect(&h.pipeline(), GenerationRequest::new("print hi", "python")).await;

    assert_eq!(
        events,
        vec![
            status("Attempt 1/3: Generating code..."),
            GenerationEvent::FinalCode {
                code: "print('hi')".to_string(),
                output: String::new(),
            },
        ]
    );
    assert_eq!(h.provider.call_count(), 1);
    assert_eq!(h.isolated.call_count(), 0);
}

#[tokio::test]
async fn two_failures_then_success() {
    let h = harness(vec![None, None, Some("x = 1")], ExecutionResult::new(0, "", ""));
    let events = collect(&h.pipeline(), GenerationRequest::new("set x", "python")).await;

    assert_eq!(events.len(), 6);
    assert_eq!(events[0], status("Attempt 1/3: Generating code..."));
    assert_eq!(
        events[1],
        status("Attempt failed: Provider API error: model unavailable. Retrying...")
    );
    assert_eq!(events[2], status("Attempt 2/3: Generating code..."));
    assert!(matches!(&events[3], GenerationEvent::Status { message } if message.ends_with("Retrying...")));
    assert_eq!(events[4], status("Attempt 3/3: Generating code..."));
    assert_eq!(
        events[5],
        GenerationEvent::FinalCode {
            code: "x = 1".to_string(),
            output: String::new(),
        }
    );
    assert_eq!(h.provider.call_count(), 3);
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn all_attempts_fail() {
    let h = harness(vec![None, None, None], ExecutionResult::new(0, "", ""));
    let events = collect(&h.pipeline(), GenerationRequest::new("anything", "python")).await;

    assert_eq!(events.len(), 6);
    assert_eq!(
        events.last().unwrap(),
        &GenerationEvent::error("Code generation failed: Provider API error: model unavailable")
    );
    let retries = events
        .iter()
        .filter(|e| matches!(e, GenerationEvent::Status { message } if message.ends_with("Retrying...")))
        .count();
    assert_eq!(retries, 2);
    assert_eq!(h.provider.call_count(), 3);
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn configured_retry_budget_is_respected() {
    let h = harness(vec![None], ExecutionResult::new(0, "", ""));
    let pipeline = h.pipeline().with_max_retries(1);
    let events = collect(&pipeline, GenerationRequest::new("anything", "python")).await;

    assert_eq!(
        events,
        vec![
            status("Attempt 1/1: Generating code..."),
            GenerationEvent::error("Code generation failed: Provider API error: model unavailable"),
        ]
    );
}

#[tokio::test]
async fn missing_prompt_or_language_is_rejected_without_model_calls() {
    let h = harness(vec![Some("unused")], ExecutionResult::new(0, "", ""));
    let pipeline = h.pipeline();

    let events = collect(&pipeline, GenerationRequest::new("", "python")).await;
    assert_eq!(events, vec![GenerationEvent::error("Prompt is required")]);

    let events = collect(&pipeline, GenerationRequest::new("print hi", "")).await;
    assert_eq!(events, vec![GenerationEvent::error("Language is required")]);

    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn uploaded_file_content_is_prepended_to_prompt() {
    let h = harness(vec![Some("print(sum)")], ExecutionResult::new(0, "", ""));
    let request = GenerationRequest::new("sum the numbers", "python").with_uploaded_file(UploadedFile {
        id: "nums".to_string(),
        name: "numbers.txt".to_string(),
        content: "1\n2\n3".to_string(),
    });

    collect(&h.pipeline(), request).await;

    let prompts = h.provider.prompts.lock().unwrap().clone();
    assert_eq!(
        prompts,
        vec!["File content:\n1\n2\n3\n\nPrompt: sum the numbers".to_string()]
    );
}

#[tokio::test]
async fn execution_output_is_attached_when_enabled() {
    let h = harness(vec![Some("print('hi')")], ExecutionResult::new(0, "hi\n", ""));
    let pipeline = h.pipeline().with_execution(true);
    let events = collect(&pipeline, GenerationRequest::new("print hi", "python")).await;

    assert_eq!(
        events.last().unwrap(),
        &GenerationEvent::FinalCode {
            code: "print('hi')".to_string(),
            output: "Exit code: 0\nhi\n".to_string(),
        }
    );
    assert_eq!(h.isolated.call_count(), 1);
    assert_eq!(h.isolated.last_observed().files["main.py"], b"print('hi')");
}

#[tokio::test]
async fn execution_of_markup_reports_not_executed() {
    let h = harness(vec![Some("<p>hi</p>")], ExecutionResult::new(0, "", ""));
    let pipeline = h.pipeline().with_execution(true);
    let events = collect(&pipeline, GenerationRequest::new("a paragraph", "html")).await;

    assert_eq!(
        events.last().unwrap(),
        &GenerationEvent::FinalCode {
            code: "<p>hi</p>".to_string(),
            output: "Exit code: 0\nLanguage not supported for server-side execution.".to_string(),
        }
    );
    assert_eq!(h.isolated.call_count(), 0);
}

struct PanickingProvider;

#[async_trait]
impl ModelProvider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        panic!("client bug");
    }
}

#[tokio::test]
async fn panicking_model_client_still_ends_with_error() {
    let h = harness(vec![], ExecutionResult::new(0, "", ""));
    let pipeline = GenerationPipeline::new(Arc::new(PanickingProvider), h.orchestrator.clone());
    let events = collect(&pipeline, GenerationRequest::new("anything", "python")).await;

    assert_eq!(events.len(), 6);
    assert!(matches!(
        events.last().unwrap(),
        GenerationEvent::Error { message } if message.starts_with("Code generation failed:")
    ));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn stream_records_are_server_sent_events() {
    let h = harness(vec![Some("print(1)")], ExecutionResult::new(0, "", ""));
    let events = collect(&h.pipeline(), GenerationRequest::new("print one", "python")).await;

    let records: Vec<String> = events.iter().map(|e| e.to_sse().unwrap()).collect();
    assert_eq!(
        records[0],
        "event: status\ndata: {\"message\":\"Attempt 1/3: Generating code...\"}\n\n"
    );
    assert_eq!(
        records[1],
        "event: final_code\ndata: {\"code\":\"print(1)\",\"output\":\"\"}\n\n"
    );
}
