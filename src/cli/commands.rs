use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use crate::cli::args::{ConfigAction, ConfigArgs, GenerateArgs, InitArgs, OutputFormat, RunArgs};
use crate::config::loader::get_config_path;
use crate::config::types::StellarConfig;
use crate::error::{Result, StellarError};
use crate::pipeline::{GenerationEvent, GenerationPipeline, GenerationRequest};
use crate::providers::create_provider;
use crate::sandbox::{
    create_services, create_services_with_uploads, DirectoryUploadStore, ExecutionResult,
    HealthReport, SandboxServices, UploadStore, UploadedFile,
};

const PING_PROMPT: &str = "Say 'Hello, World!'";

// ============================================================================
// Generation / Execution Commands
// ============================================================================

/// Run the generation pipeline and stream its events to stdout
pub async fn generate(args: GenerateArgs, config: StellarConfig) -> Result<()> {
    info!(language = %args.language, "Generating code");

    let provider = create_provider(&config.provider)?;

    let (services, uploaded_file) = match &args.file {
        Some(path) => {
            let (file, store) = attach_local_file(path)?;
            (create_services_with_uploads(&config, store), Some(file))
        }
        None => (create_services(&config), None),
    };

    let pipeline = GenerationPipeline::new(provider, services.orchestrator)
        .with_max_retries(config.generation.max_retries)
        .with_execution(args.execute || config.generation.execute_generated_code);

    let mut request = GenerationRequest::new(args.prompt, args.language);
    request.uploaded_file = uploaded_file;

    let mut events = pipeline.generate_stream(request);
    let mut failed = false;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        failed = matches!(event, GenerationEvent::Error { .. });
        stdout.write_all(event.to_sse()?.as_bytes())?;
        stdout.flush()?;
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

/// Run a source file through the sandbox orchestrator
pub async fn run(args: RunArgs, config: StellarConfig, format: OutputFormat) -> Result<()> {
    info!(source = %args.source.display(), language = %args.language, "Running source file");

    let code = tokio::fs::read_to_string(&args.source).await?;

    let (services, uploaded_file) = match &args.file {
        Some(path) => {
            let (file, store) = attach_local_file(path)?;
            (create_services_with_uploads(&config, store), Some(file))
        }
        None => (create_services(&config), None),
    };

    let result = services
        .orchestrator
        .run(&code, &args.language, uploaded_file.as_ref())
        .await;

    output_command_result(&result, format);

    Ok(())
}

/// Report daemon and per-language sandbox status
pub async fn health(config: StellarConfig, format: OutputFormat) -> Result<()> {
    let SandboxServices { health, .. } = create_services(&config);
    let report = health.check().await;

    match format {
        OutputFormat::Text => print_health(&report)?,
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

/// List the run table
pub async fn languages(config: StellarConfig, format: OutputFormat) -> Result<()> {
    let services = create_services(&config);
    let specs = services.registry.specs();

    match format {
        OutputFormat::Text => {
            println!("{:<10} {:<32} {:<12} COMMAND", "LANGUAGE", "IMAGE", "FILE");
            println!("{}", "-".repeat(70));
            for spec in specs {
                println!(
                    "{:<10} {:<32} {:<12} {}",
                    spec.language,
                    spec.sandbox_image.as_deref().unwrap_or("-"),
                    spec.entry_file_name,
                    if spec.run_command.is_empty() {
                        "(not executed)".to_string()
                    } else {
                        spec.shell_command()
                    }
                );
            }
        }
        OutputFormat::Json => {
            let json_specs: Vec<_> = specs
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "language": s.language,
                        "image": s.sandbox_image,
                        "file": s.entry_file_name,
                        "command": s.run_command,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json_specs)?);
        }
    }

    Ok(())
}

/// Send a fixed prompt to the configured model
pub async fn ping(config: StellarConfig, format: OutputFormat) -> Result<()> {
    let provider = create_provider(&config.provider)?;
    let response = provider.generate(PING_PROMPT).await?;

    match format {
        OutputFormat::Text => println!("{}", response.trim_end()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "status": "success",
                "provider": provider.name(),
                "response": response,
            })
        ),
    }

    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

pub async fn init(args: InitArgs) -> Result<()> {
    let config_path = get_config_path();

    if config_path.exists() && !args.force {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    // Create parent directories if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write default configuration
    let default_config = StellarConfig::default();
    let toml_str =
        toml::to_string_pretty(&default_config).map_err(|e| StellarError::Config(e.to_string()))?;

    std::fs::write(&config_path, toml_str)?;

    println!("Created configuration at: {}", config_path.display());
    println!("\nQuick start:");
    println!("  # Generate code, streaming progress events");
    println!("  stellar generate --language python \"print hello\"");
    println!();
    println!("  # Run a source file in its language sandbox");
    println!("  stellar run --language cpp main.cpp");
    println!();
    println!("  # Check Docker and the per-language sandboxes");
    println!("  stellar health");

    Ok(())
}

pub async fn config(args: ConfigArgs, config: StellarConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let toml_str =
                toml::to_string_pretty(&config).map_err(|e| StellarError::Config(e.to_string()))?;
            println!("{}", toml_str);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Treat a local file as an upload: its directory becomes the upload store.
fn attach_local_file(path: &Path) -> Result<(UploadedFile, Arc<dyn UploadStore>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StellarError::Config(format!("Invalid file path: {}", path.display())))?
        .to_string();

    let bytes = std::fs::read(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let file = UploadedFile {
        id: name.clone(),
        name,
        content: String::from_utf8_lossy(&bytes).into_owned(),
    };

    Ok((file, Arc::new(DirectoryUploadStore::new(dir))))
}

fn print_health(report: &HealthReport) -> Result<()> {
    // Reuse the serialized status strings for the text table
    let json = serde_json::to_value(report)?;

    println!("service: {}", report.service);
    println!("docker:  {}", json["daemon"].as_str().unwrap_or("unknown"));
    println!("checked: {}", report.checked_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("{:<12} STATUS", "SANDBOX");
    println!("{}", "-".repeat(30));
    for language in report.sandboxes.keys() {
        println!(
            "{:<12} {}",
            language,
            json["sandboxes"][language].as_str().unwrap_or("unknown")
        );
    }

    Ok(())
}

fn output_command_result(result: &ExecutionResult, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            if !result.stdout.is_empty() {
                print!("{}", result.stdout);
            }
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            // Exit with the program's exit code
            if result.exit_code != 0 {
                std::process::exit(result.exit_code);
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                    "exit_code": result.exit_code,
                })
            );
        }
    }
}
