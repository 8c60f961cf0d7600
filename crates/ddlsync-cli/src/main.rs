use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use ddlsync_catalog::{FileStore, MemoryStore, MockTarget, SnapshotFile};
use ddlsync_core::{Config, OutcomeStatus, RunReport};
use ddlsync_engine::{DefinitionSource, Reconciler};
use ddlsync_graph::DependencyGraph;

/// ddlsync - declarative schema reconciliation
#[derive(Parser)]
#[command(name = "ddlsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ddlsync.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a target against a directory of definitions
    Sync {
        /// Directory holding the definition files
        dir: PathBuf,

        /// Artifact state file
        #[arg(short, long, default_value = "state.json")]
        state: PathBuf,

        /// Target snapshot file
        #[arg(short, long, default_value = "target.json")]
        target: PathBuf,

        /// Output file for report.json
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Print the dependency-first order of every kind
    Order {
        /// Directory holding the definition files
        dir: PathBuf,
    },

    /// Parse every definition without touching any target
    Check {
        /// Directory holding the definition files
        dir: PathBuf,
    },

    /// Show what depends on an artifact, directly or transitively
    Impact {
        /// Directory holding the definition files
        dir: PathBuf,

        /// Artifact name or key
        artifact: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("ddlsync.toml").exists() {
        Config::from_file(Path::new("ddlsync.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };
    let config = config.with_env_overrides(std::env::vars())?;

    if cli.verbose {
        eprintln!(
            "{} empty update policy: {:?}, default schema: {}",
            "Using".cyan(),
            config.reconcile.empty_update,
            config.reconcile.default_schema
        );
    }

    match cli.command {
        Commands::Sync { dir, state, target, report } => {
            sync_command(config, &dir, &state, &target, report.as_deref(), cli.verbose).await
        }
        Commands::Order { dir } => order_command(config, &dir, cli.verbose),
        Commands::Check { dir } => check_command(config, &dir, cli.verbose),
        Commands::Impact { dir, artifact } => impact_command(config, &dir, &artifact, cli.verbose),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ddlsync=debug" } else { "ddlsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Reconciler over in-memory seams, for commands that never touch a target
fn offline_reconciler(config: Config) -> Reconciler {
    Reconciler::new(Arc::new(MockTarget::new()), Arc::new(MemoryStore::new()), config)
}

/// Sync command - reconcile the target snapshot with the definitions
async fn sync_command(
    config: Config,
    dir: &Path,
    state: &Path,
    target: &Path,
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let store = FileStore::open(state)
        .await
        .with_context(|| format!("Failed to open state file {}", state.display()))?;
    let snapshot = SnapshotFile::new(target);
    let live = snapshot
        .load()
        .await
        .with_context(|| format!("Failed to load target snapshot {}", target.display()))?;

    if verbose {
        eprintln!("{} {}", "State file:".cyan(), store.path().display());
    }

    let reconciler = Reconciler::new(Arc::new(live.clone()), Arc::new(store), config);
    let sources = collect_sources(dir, |location| reconciler.loader().accepts(location))?;

    if verbose {
        eprintln!("{} {} definition files from {}", "Loaded".cyan(), sources.len(), dir.display());
    }

    let report = reconciler.run(&sources).await;

    snapshot
        .save(&live)
        .await
        .with_context(|| format!("Failed to save target snapshot {}", target.display()))?;

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        if verbose {
            eprintln!("{} {}", "Report written to".cyan(), path.display());
        }
    }

    print_report_summary(&report);

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

/// Order command - print each kind's dependency-first order
fn order_command(config: Config, dir: &Path, verbose: bool) -> Result<()> {
    let reconciler = offline_reconciler(config);
    let sources = collect_sources(dir, |location| reconciler.loader().accepts(location))?;
    let (artifacts, errors) = reconciler.loader().load_all(&sources);

    if verbose {
        eprintln!("{} {} artifacts", "Parsed".cyan(), artifacts.len());
    }
    for error in &errors {
        eprintln!("{} {}", "Skipping".yellow(), error);
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Reconciliation Order".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    match reconciler.order(&artifacts) {
        Ok(kinds) => {
            for (kind, sorted) in kinds {
                if sorted.ordered.is_empty() {
                    continue;
                }

                println!("{}", format!("{}:", kind).bold());
                for (i, name) in sorted.ordered.iter().enumerate() {
                    println!("  {}. {}", i + 1, name.green());
                }
                if !sorted.external.is_empty() {
                    println!("  {} {}", "external:".yellow(), sorted.external.join(", "));
                }
                println!();
            }
        }
        Err(cycle) => {
            println!("{} {}", "✗".red().bold(), cycle.to_string().red());
            println!();
            println!("{}", "=".repeat(60).bright_blue());
            std::process::exit(1);
        }
    }

    println!("{}", "=".repeat(60).bright_blue());

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Check command - parse only
fn check_command(config: Config, dir: &Path, verbose: bool) -> Result<()> {
    let reconciler = offline_reconciler(config);
    let sources = collect_sources(dir, |location| reconciler.loader().accepts(location))?;
    let (artifacts, errors) = reconciler.loader().load_all(&sources);

    if verbose {
        for artifact in &artifacts {
            eprintln!("  {} {}", "parsed".cyan(), artifact.key);
        }
    }

    println!(
        "{} definition files, {} artifacts",
        sources.len(),
        format!("{}", artifacts.len()).green()
    );

    if errors.is_empty() {
        println!("{}", "✓ All definitions parsed".green().bold());
        return Ok(());
    }

    println!("{}", "Parse errors:".bold());
    for error in &errors {
        println!("  [{}] {}: {}", "ERROR".red().bold(), error.location, error.message);
    }
    std::process::exit(1);
}

/// Impact command - list artifacts depending on one artifact
fn impact_command(config: Config, dir: &Path, artifact: &str, verbose: bool) -> Result<()> {
    let reconciler = offline_reconciler(config);
    let sources = collect_sources(dir, |location| reconciler.loader().accepts(location))?;
    let (artifacts, errors) = reconciler.loader().load_all(&sources);
    for error in &errors {
        eprintln!("{} {}", "Skipping".yellow(), error);
    }

    let key = artifacts
        .iter()
        .find(|a| a.key == artifact)
        .or_else(|| artifacts.iter().find(|a| a.name == artifact))
        .map(|a| a.key.clone())
        .ok_or_else(|| anyhow::anyhow!("Artifact '{}' not found in {}", artifact, dir.display()))?;

    if verbose {
        eprintln!("{} {}", "Analyzing impact for:".cyan(), key);
    }

    let graph = DependencyGraph::from_artifacts(&artifacts);
    let downstream = graph.downstream(&key);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Downstream Impact Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Artifact:".bold(), key.green());
    println!("{} {}", "Dependents:".bold(), downstream.len());
    println!();

    if downstream.is_empty() {
        println!("{}", "✓ Nothing depends on this artifact".green());
    } else {
        for (i, dependent) in downstream.iter().enumerate() {
            println!("  {}. {}", i + 1, dependent.yellow());
        }
        println!();
        println!("{}", "⚠ Dropping this artifact requires dropping these first".yellow().bold());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Read every accepted definition under `dir`
///
/// Locations are relative to `dir`, start with `/` and use `/` separators,
/// so a state file stays valid when the directory moves.
fn collect_sources(dir: &Path, accepts: impl Fn(&str) -> bool) -> Result<Vec<DefinitionSource>> {
    if !dir.is_dir() {
        anyhow::bail!("Definitions directory not found: {}", dir.display());
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let location = format!(
            "/{}",
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        );

        if !accepts(&location) {
            tracing::debug!(location = %location, "ignoring file");
            continue;
        }

        let content = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        sources.push(DefinitionSource::new(location, content));
    }

    Ok(sources)
}

fn print_report_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Reconciliation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Outcomes:   {}", report.summary.total);
    println!("  Succeeded:  {}", format!("{}", report.summary.succeeded).green());

    if report.summary.failed > 0 {
        println!("  Failed:     {}", format!("{}", report.summary.failed).red().bold());
    } else {
        println!("  Failed:     {}", format!("{}", report.summary.failed).green());
    }

    if report.summary.refused > 0 {
        println!("  Refused:    {}", format!("{}", report.summary.refused).yellow());
    }
    if report.summary.unresolved > 0 {
        println!("  Unresolved: {}", format!("{}", report.summary.unresolved).yellow());
    }
    println!();

    let changes: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status != OutcomeStatus::Satisfied)
        .collect();

    if changes.is_empty() && report.errors.is_empty() {
        println!("{}", "✓ Target is up to date".green().bold());
    }

    if !changes.is_empty() {
        println!("{}", "Outcomes:".bold());
        for outcome in changes {
            let status = match outcome.status {
                OutcomeStatus::Created | OutcomeStatus::Updated | OutcomeStatus::Deleted => {
                    outcome.status.as_str().green().bold()
                }
                OutcomeStatus::FailedDelete | OutcomeStatus::FailedUpdate => {
                    outcome.status.as_str().yellow().bold()
                }
                _ => outcome.status.as_str().red().bold(),
            };

            print!("  [{}] {} {} ({})", status, outcome.kind, outcome.name, outcome.phase);
            match &outcome.message {
                Some(message) => println!(": {}", message),
                None => println!(),
            }
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("{}", "Errors:".bold());
        for error in &report.errors {
            println!("  {}", error.red());
        }
        println!();
    }

    println!("{}", "=".repeat(60).bright_blue());
}
