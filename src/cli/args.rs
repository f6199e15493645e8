use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "stellar")]
#[clap(version, about = "Generate code from a prompt and run it in a per-language sandbox")]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Configuration file path
    #[clap(short, long, global = true, env = "STELLAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[clap(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate code from a prompt, streaming progress as server-sent events
    Generate(GenerateArgs),

    /// Run a source file in the sandbox for its language
    Run(RunArgs),

    /// Check the isolation daemon and each language sandbox
    Health,

    /// List the configured run table
    Languages,

    /// Send a fixed prompt to the model to verify connectivity
    Ping,

    /// Initialize a new stellar configuration
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

// ============================================================================
// Generation / Execution Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What the generated code should do
    pub prompt: String,

    /// Target language identifier (e.g., python, cpp, java, html)
    #[clap(long, short = 'l')]
    pub language: String,

    /// File whose content is given to the model and copied next to the code
    #[clap(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Execute the generated code and include its output in the final event
    #[clap(long)]
    pub execute: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source file to execute
    pub source: PathBuf,

    /// Language identifier of the source
    #[clap(long, short = 'l')]
    pub language: String,

    /// Extra file copied into the workspace under its own name
    #[clap(long, short = 'f')]
    pub file: Option<PathBuf>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
}

#[derive(Debug, Clone, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
