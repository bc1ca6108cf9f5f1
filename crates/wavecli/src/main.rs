// crates/wavecli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wavecore::{
    Manifest, OrchestrationError, OrchestrationEvent, OrchestrationResult, UnitEvent, UnitSpec,
    UnitStatus,
};
use waveruntime::{validate_plan, WaveRuntime};

#[derive(Parser)]
#[command(name = "wave")]
#[command(about = "Dependency-ordered unit orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every unit in a manifest
    Run {
        /// Path to manifest JSON file
        #[arg(short, long)]
        manifest: PathBuf,

        /// Input payload as JSON string
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read the input payload from a JSON file
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Correlation id for the run (random if omitted)
        #[arg(long)]
        run_id: Option<Uuid>,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Show debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check a manifest for unknown units, unknown dependencies and cycles
    Validate {
        /// Path to manifest JSON file
        file: PathBuf,
    },

    /// Print the execution waves of a manifest
    Plan {
        /// Path to manifest JSON file
        file: PathBuf,
    },

    /// List available unit types
    Units,

    /// Create an example manifest
    Init {
        /// Output file path
        #[arg(short, long, default_value = "manifest.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            input,
            input_file,
            run_id,
            json,
            verbose,
        } => {
            init_logging(verbose);

            let input = read_input(input, input_file)?;
            let run_id = run_id.unwrap_or_else(Uuid::new_v4);
            let success = run_manifest(&manifest, input, run_id, json).await?;
            if !success {
                std::process::exit(1);
            }
        }

        Commands::Validate { file } => {
            validate_manifest(&file)?;
        }

        Commands::Plan { file } => {
            print_plan(&file)?;
        }

        Commands::Units => {
            list_units();
        }

        Commands::Init { output } => {
            create_example_manifest(&output)?;
        }
    }

    Ok(())
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    Manifest::from_json(&raw).with_context(|| format!("Invalid manifest {}", path.display()))
}

fn load_runtime(path: &Path) -> Result<(Manifest, WaveRuntime)> {
    let manifest = load_manifest(path)?;
    let runtime = WaveRuntime::from_manifest(&manifest, &waveunits::standard_catalog())?;
    Ok((manifest, runtime))
}

fn read_input(input: Option<String>, input_file: Option<PathBuf>) -> Result<Value> {
    let raw = match (input, input_file) {
        (Some(inline), _) => inline,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input {}", path.display()))?,
        (None, None) => return Ok(json!({})),
    };
    serde_json::from_str(&raw).context("Input must be valid JSON")
}

async fn run_manifest(path: &Path, input: Value, run_id: Uuid, as_json: bool) -> Result<bool> {
    let (manifest, runtime) = load_runtime(path)?;
    tracing::debug!(manifest = %path.display(), run_id = %run_id, "Manifest loaded");

    if !as_json {
        println!("🚀 Loaded manifest: {}", runtime.name());
        println!("   Units: {}", manifest.units.len());
        println!("   Waves: {}", runtime.plan().len());
        println!();
    }

    // Stream lifecycle events until the run reports completion
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Event listener fell behind; {} events dropped", missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !as_json {
                print_event(&event);
            }
            if matches!(event, OrchestrationEvent::RunCompleted { .. }) {
                break;
            }
        }
    });

    let outcome = runtime.execute(input, run_id).await;

    let result = match outcome {
        Ok(result) => {
            let _ = event_task.await;
            result
        }
        Err(OrchestrationError::Aborted {
            unit_id,
            error,
            partial,
        }) => {
            let _ = event_task.await;
            tracing::error!(unit_id = %unit_id, "Run aborted: {}", error);
            eprintln!("💥 Run aborted: unit {} failed: {}", unit_id, error);
            *partial
        }
        Err(e) => {
            event_task.abort();
            return Err(e.into());
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(result.success)
}

fn print_event(event: &OrchestrationEvent) {
    match event {
        OrchestrationEvent::RunStarted { run_id, .. } => {
            println!("▶️  Run {} started", run_id);
        }
        OrchestrationEvent::WaveStarted { wave, units, .. } => {
            println!("🌊 Wave {}: {}", wave, units.join(", "));
        }
        OrchestrationEvent::UnitStarted { unit_id, .. } => {
            println!("  ⚡ Starting unit: {}", unit_id);
        }
        OrchestrationEvent::UnitCompleted {
            unit_id,
            confidence,
            duration_ms,
            ..
        } => {
            println!(
                "  ✅ Unit {} completed in {}ms (confidence {:.2})",
                unit_id, duration_ms, confidence
            );
        }
        OrchestrationEvent::UnitFailed { unit_id, error, .. } => {
            println!("  ❌ Unit {} failed: {}", unit_id, error);
        }
        OrchestrationEvent::UnitSkipped { unit_id, reason, .. } => {
            println!("  ⏭️  Unit {} skipped: {:?}", unit_id, reason);
        }
        OrchestrationEvent::UnitEvent { unit_id, event, .. } => match event {
            UnitEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", unit_id, message);
            }
            UnitEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", unit_id, message);
            }
            UnitEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {}% - {}", unit_id, percent, msg);
                } else {
                    println!("     📊 [{}] {}%", unit_id, percent);
                }
            }
        },
        OrchestrationEvent::WaveCompleted {
            wave, duration_ms, ..
        } => {
            println!("  🏁 Wave {} settled in {}ms", wave, duration_ms);
        }
        OrchestrationEvent::RunCompleted {
            status, duration_ms, ..
        } => {
            println!("✨ Run finished ({:?}) in {}ms", status, duration_ms);
        }
    }
}

fn print_summary(result: &OrchestrationResult) {
    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", result.run_id);
    println!("   Status: {:?}", result.status);
    println!(
        "   Completed: {}  Failed: {}  Skipped: {}",
        result.completed_count, result.failed_count, result.skipped_count
    );
    if let Some(average) = result.average_confidence() {
        println!("   Average confidence: {:.2}", average);
    }

    for status in [UnitStatus::Failed, UnitStatus::Skipped] {
        for unit_id in result.units_with_status(status) {
            let execution = &result.executions[unit_id];
            let detail = execution
                .error
                .clone()
                .or_else(|| execution.skip_reason.as_ref().map(|r| format!("{:?}", r)))
                .unwrap_or_default();
            println!("   {:?} {}: {}", status, unit_id, detail);
        }
    }

    if !result.results.is_empty() {
        println!();
        println!("📤 Results:");
        for unit_id in result.plan.unit_ids() {
            if let Some(unit_result) = result.results.get(unit_id) {
                println!(
                    "   {} ({:.2}): {}",
                    unit_id, unit_result.confidence, unit_result.payload
                );
            }
        }
    }
}

fn validate_manifest(path: &Path) -> Result<()> {
    println!("🔍 Validating manifest: {}", path.display());

    let (manifest, runtime) = load_runtime(path)?;
    validate_plan(runtime.plan(), runtime.orchestrator().registry())?;

    println!("✅ Manifest is valid:");
    println!("   Name: {}", manifest.name);
    println!("   Units: {}", manifest.units.len());
    println!("   Waves: {}", runtime.plan().len());

    Ok(())
}

fn print_plan(path: &Path) -> Result<()> {
    let (manifest, runtime) = load_runtime(path)?;
    let config = runtime.orchestrator().config();

    println!("📋 Plan for {}", manifest.name);
    for wave in runtime.plan().waves() {
        println!("   Wave {}:", wave.index);
        for unit_id in &wave.units {
            println!("     • {} (timeout {}ms)", unit_id, config.timeout_ms_for(unit_id));
        }
    }
    if let Some(max) = config.max_parallelism {
        println!();
        println!("   ⚠️  At most {} units run per wave; the rest of a wave is skipped.", max);
    }

    Ok(())
}

fn list_units() {
    println!("📦 Available Unit Types:");
    println!();

    let catalog = waveunits::standard_catalog();
    for unit_type in catalog.list_unit_types() {
        if let Some(metadata) = catalog.get_metadata(&unit_type) {
            println!("  • {} ({})", unit_type, metadata.category);
            println!("    {}", metadata.description);
            for field in &metadata.config {
                let marker = if field.required { "required" } else { "optional" };
                println!("      - {} [{}]: {}", field.name, marker, field.description);
            }
        } else {
            println!("  • {}", unit_type);
        }
    }
}

fn create_example_manifest(output: &Path) -> Result<()> {
    let mut manifest = Manifest::new("Persona Analysis");
    manifest.description = Some("Four persona units scoring a piece of text".to_string());

    manifest
        .add_unit(
            UnitSpec::new("Tim", "text.keywords")
                .with_config("keywords", json!(["experiment", "habit", "test", "fear"])),
        )
        .add_unit(
            UnitSpec::new("Daniel", "text.keywords")
                .depends_on("Tim")
                .with_config("keywords", json!(["bias", "intuition", "system"])),
        )
        .add_unit(
            UnitSpec::new("Brene", "text.keywords")
                .depends_on("Tim")
                .with_config("keywords", json!(["courage", "vulnerability", "shame"])),
        )
        .add_unit(
            UnitSpec::new("Charlie", "aggregate.confidence")
                .depends_on("Daniel")
                .depends_on("Brene")
                .with_timeout(5_000),
        );

    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(output, json)?;

    println!("✨ Created example manifest: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  wave run --manifest {} --input '{{\"text\": \"Courage is a habit you test.\"}}'",
        output.display()
    );

    Ok(())
}
