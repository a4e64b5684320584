//! batch-reconciler - converge AWS Batch resources toward a manifest
//!
//! Usage: batch-reconciler [OPTIONS] <COMMAND>
//!
//! Commands:
//!   validate  Check a manifest offline
//!   render    Print the create requests a manifest produces
//!   plan      Show what apply would change
//!   apply     Create, update or replace resources
//!   destroy   Delete every resource in a manifest
//!   read      Describe one resource

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use batch_reconciler_core::mapping::{
    create_compute_environment_request, create_job_queue_request,
    CreateComputeEnvironmentRequest, CreateJobQueueRequest,
};
use batch_reconciler_core::{
    ApplyReport, BatchReconcilerService, Manifest, Plan, PlannedAction, ReconcileError,
    ResourceKind,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use serde::Serialize;

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "batch-reconciler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// AWS region, overriding the environment and profile
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Named AWS profile to load credentials from
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse and validate a manifest without calling AWS
    Validate {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,
    },

    /// Print the create requests for every resource as JSON
    Render {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,
    },

    /// Compare a manifest against AWS Batch and print the planned actions
    Plan {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,
    },

    /// Apply a manifest: compute environments first, then job queues
    Apply {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Write the tracked state to this file after applying
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Delete every resource in a manifest: job queues first
    Destroy {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Describe a single resource by name
    Read {
        #[arg(value_enum)]
        kind: KindArg,

        name: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    ComputeEnvironment,
    JobQueue,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::ComputeEnvironment => ResourceKind::ComputeEnvironment,
            KindArg::JobQueue => ResourceKind::JobQueue,
        }
    }
}

/// Failure that maps to a specific exit code.
#[derive(Debug)]
enum Outcome {
    Invalid(String),
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for Outcome {
    fn from(error: anyhow::Error) -> Self {
        Outcome::Failed(error)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Load and validate, reporting every problem on stderr.
fn load_manifest(path: &Path) -> Result<Manifest, Outcome> {
    let manifest = Manifest::load(path).map_err(|e| Outcome::Invalid(e.to_string()))?;
    let problems = manifest.problems();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        return Err(Outcome::Invalid(format!(
            "{} has {} problem(s)",
            path.display(),
            problems.len()
        )));
    }
    debug!(
        "Manifest {} declares {} compute environment(s) and {} job queue(s)",
        path.display(),
        manifest.compute_environments.len(),
        manifest.job_queues.len()
    );
    Ok(manifest)
}

/// Without `--yes`, ask on a TTY and refuse otherwise.
fn confirm(action: &str, yes: bool) -> Result<bool, Outcome> {
    if yes {
        return Ok(true);
    }
    if !atty::is(atty::Stream::Stdin) {
        return Err(Outcome::Invalid(format!(
            "Refusing to {action} without confirmation: run interactively in a TTY or pass --yes"
        )));
    }

    eprint!("Do you want to {action}? [y/N] ");
    io::stderr().flush().context("Failed to flush prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

async fn service(cli: &Cli, manifest: Option<&Manifest>) -> Result<BatchReconcilerService> {
    let config = manifest.map(|m| m.settings.clone()).unwrap_or_default();
    BatchReconcilerService::from_env(cli.region.as_deref(), cli.profile.as_deref(), config)
        .await
        .context("Failed to initialize service")
}

fn print_plan(plan: &Plan) {
    for entry in &plan.entries {
        eprintln!("{:>8}  {} '{}'", entry.action, entry.kind, entry.name);
        for change in &entry.changes {
            let marker = if change.forces_replacement {
                " (forces replacement)"
            } else {
                ""
            };
            eprintln!(
                "            {}: {} -> {}{}",
                change.field, change.current, change.desired, marker
            );
        }
    }
    if !plan.has_changes() {
        eprintln!("No changes. AWS Batch matches the manifest.");
    }
}

fn print_report(report: &ApplyReport) {
    for outcome in &report.outcomes {
        if outcome.action == PlannedAction::NoOp {
            continue;
        }
        match &outcome.arn {
            Some(arn) => eprintln!(
                "{:>8}  {} '{}': {}",
                outcome.action, outcome.kind, outcome.name, arn
            ),
            None => eprintln!("{:>8}  {} '{}'", outcome.action, outcome.kind, outcome.name),
        }
    }
    eprintln!("{} resource(s) changed.", report.changed());
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct RenderedRequests {
    compute_environments: Vec<CreateComputeEnvironmentRequest>,
    job_queues: Vec<CreateJobQueueRequest>,
}

async fn run(cli: Cli) -> Result<(), Outcome> {
    match &cli.command {
        Commands::Validate { manifest } => {
            let loaded = load_manifest(manifest)?;
            eprintln!(
                "{} is valid: {} compute environment(s), {} job queue(s)",
                manifest.display(),
                loaded.compute_environments.len(),
                loaded.job_queues.len()
            );
        }

        Commands::Render { manifest } => {
            let loaded = load_manifest(manifest)?;
            print_json(&RenderedRequests {
                compute_environments: loaded
                    .compute_environments
                    .iter()
                    .map(create_compute_environment_request)
                    .collect(),
                job_queues: loaded
                    .job_queues
                    .iter()
                    .map(create_job_queue_request)
                    .collect(),
            })?;
        }

        Commands::Plan { manifest } => {
            let loaded = load_manifest(manifest)?;
            let service = service(&cli, Some(&loaded)).await?;
            let plan = service.plan(&loaded).await.map_err(reconcile_failure)?;
            print_plan(&plan);
        }

        Commands::Apply {
            manifest,
            yes,
            state_file,
        } => {
            let loaded = load_manifest(manifest)?;
            // Nobody can answer the prompt: refuse before touching AWS.
            if !*yes && !atty::is(atty::Stream::Stdin) {
                confirm("apply these changes", false)?;
            }
            let service = service(&cli, Some(&loaded)).await?;
            let plan = service.plan(&loaded).await.map_err(reconcile_failure)?;
            print_plan(&plan);
            if !plan.has_changes() {
                return Ok(());
            }
            if !confirm("apply these changes", *yes)? {
                eprintln!("Apply cancelled.");
                return Ok(());
            }

            let result = service.apply(&loaded).await;
            if let Some(path) = state_file {
                write_state(&service, path)?;
            }
            print_report(&result.map_err(reconcile_failure)?);
        }

        Commands::Destroy { manifest, yes } => {
            let loaded = load_manifest(manifest)?;
            if !confirm("destroy every resource in the manifest", *yes)? {
                eprintln!("Destroy cancelled.");
                return Ok(());
            }
            let service = service(&cli, Some(&loaded)).await?;
            let report = service.destroy(&loaded).await.map_err(reconcile_failure)?;
            print_report(&report);
        }

        Commands::Read { kind, name } => {
            let service = service(&cli, None).await?;
            let found = match kind {
                KindArg::ComputeEnvironment => service
                    .read_compute_environment(name)
                    .await
                    .map_err(reconcile_failure)?
                    .map(serde_json::to_value),
                KindArg::JobQueue => service
                    .read_job_queue(name)
                    .await
                    .map_err(reconcile_failure)?
                    .map(serde_json::to_value),
            };
            match found.transpose().context("Failed to serialize record")? {
                Some(value) => print_json(&value)?,
                None => eprintln!("No {} named '{name}' exists.", ResourceKind::from(*kind)),
            }
        }
    }
    Ok(())
}

fn reconcile_failure(error: ReconcileError) -> Outcome {
    match error {
        ReconcileError::InvalidSpec { .. } | ReconcileError::Manifest(_) => {
            Outcome::Invalid(error.to_string())
        }
        other => Outcome::Failed(anyhow::Error::new(other)),
    }
}

fn write_state(service: &BatchReconcilerService, path: &Path) -> Result<()> {
    let state = service.tracked_state();
    let json = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write state file {}", path.display()))?;
    info!("Wrote {} tracked resource(s) to {}", state.len(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Outcome::Invalid(message)) => {
            eprintln!("Error: {message}");
            ExitCode::from(EXIT_INVALID)
        }
        Err(Outcome::Failed(error)) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
