//! `weft` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server with the built-in node handlers.
//! - `validate` — validate a workflow JSON file.
//! - `run`      — execute a workflow JSON file once, manually triggered.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use api::AppState;
use engine::{ExecutorConfig, TriggerSource, WorkflowDefinition, WorkflowExecutor};
use nodes::HandlerRegistry;
use webhook::WebhookService;

#[derive(Parser)]
#[command(
    name = "weft",
    about = "Workflow automation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
    },
    /// Execute a workflow JSON file once and print the result.
    Run {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
        /// Initial input, as inline JSON.
        #[arg(long, default_value = "null")]
        input: String,
    },
}

fn load_workflow(path: &std::path::Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid workflow JSON")
}

fn build_executor() -> Arc<WorkflowExecutor> {
    let registry = Arc::new(HandlerRegistry::with_builtins());
    Arc::new(WorkflowExecutor::new(registry, ExecutorConfig::default()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            info!("Starting API server on {bind}");
            let service = Arc::new(WebhookService::new(build_executor()));
            api::serve(&bind, AppState::new(service)).await?;
        }
        Command::Validate { path } => {
            let workflow = load_workflow(&path)?;
            match engine::validate_dag(&workflow) {
                Ok(order) => {
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run { path, input } => {
            let workflow = load_workflow(&path)?;
            let input = serde_json::from_str(&input).context("invalid --input JSON")?;

            let executor = build_executor();
            let record = executor
                .run(&workflow, input, TriggerSource::Manual)
                .await?;

            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
