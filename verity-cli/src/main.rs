//! Verity CLI - evaluate LLM factuality and fact-checker quality from the terminal.

mod commands;

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Verity: fact-checking evaluation harness for LLM outputs
#[derive(Parser, Debug)]
#[command(name = "verity", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.verity/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run an evaluation
    Evaluate {
        #[command(subcommand)]
        action: EvaluateAction,
    },
    /// Inspect registered solvers
    Solvers {
        #[command(subcommand)]
        action: SolversAction,
    },
    /// Inspect the configured pipeline
    Pipeline {
        #[command(subcommand)]
        action: PipelineAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum EvaluateAction {
    /// Evaluate a model's responses over the benchmark datasets
    Llm {
        /// Name of the model that produced the responses
        #[arg(long)]
        model_name: String,
        /// CSV with two columns: question index and response
        #[arg(short, long)]
        input: PathBuf,
        /// Root directory for run outputs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Directory with the benchmark `*.jsonl` files
        #[arg(short, long)]
        dataset_dir: Option<PathBuf>,
        /// Comma-separated datasets (default: all configured)
        #[arg(long, value_delimiter = ',')]
        datasets: Vec<String>,
        /// Skip writing analysis.json
        #[arg(long)]
        no_analyze: bool,
        /// Skip writing report.md
        #[arg(long)]
        no_report: bool,
    },
    /// Fact-check a single response with the configured pipeline
    Response {
        /// The text to check
        text: String,
        /// The question the text answers
        #[arg(long)]
        question: Option<String>,
    },
    /// Score a fact-checker's predictions against gold labels
    Checker {
        /// CSV with `label` and `prediction` columns
        #[arg(short, long)]
        input: PathBuf,
        /// Root directory for run outputs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum SolversAction {
    /// List registered solvers
    List,
}

#[derive(clap::Subcommand, Debug)]
enum PipelineAction {
    /// Show the configured solver chain
    Show,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Initialize a new configuration file
    Init,
    /// Show current configuration
    Show,
}

/// Daily-rolling `verity.log` writer under `dir`.
fn log_file_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::daily(dir, "verity.log");
    Ok(tracing_appender::non_blocking(file_appender))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "verity", "verity")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let (json_layer, _guard, log_dir_error) = match log_file_writer(&log_dir) {
        Ok((non_blocking, guard)) => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    if let Some(e) = log_dir_error {
        tracing::warn!(
            dir = %log_dir.display(),
            error = %e,
            "Cannot create log directory; logging to stderr only"
        );
    }

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
