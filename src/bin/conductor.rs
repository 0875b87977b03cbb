//! Command-line workflow runner: load a definition, drive it to a
//! terminal status, and print a summary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use conductor::{config, telemetry, Engine, TelemetryConfig, WorkflowStatus};

#[derive(Debug, Parser)]
#[command(
    name = "conductor",
    version,
    about = "Run a workflow definition against its configured agents"
)]
struct Args {
    /// Path to a YAML or JSON workflow definition.
    workflow: PathBuf,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    telemetry::init_telemetry(&TelemetryConfig {
        log_level: args.log_level.clone(),
        ..TelemetryConfig::default()
    })
    .map_err(anyhow::Error::from_boxed)?;

    let definition = config::load_path(&args.workflow)
        .with_context(|| format!("failed to load {}", args.workflow.display()))?;
    let engine = Engine::new(definition)?;
    let result = engine.run().await;

    println!("Workflow completed with status: {}", result.status);
    println!(
        "Completed tasks: {}/{}",
        result.completed_count, result.total_count
    );
    println!("Execution time: {:.2}s", result.elapsed.as_secs_f64());

    if !result.results.is_empty() {
        println!("\nResults:");
        for (task, value) in &result.results {
            println!("  {task}: {value}");
        }
    }
    if !result.errors.is_empty() {
        println!("\nErrors:");
        for (task, error) in &result.errors {
            println!("  {task}: {error}");
        }
    }

    Ok(
        if matches!(
            result.status,
            WorkflowStatus::Completed | WorkflowStatus::PartiallyCompleted
        ) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        },
    )
}
